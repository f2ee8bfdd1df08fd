mod test_artifact;
mod test_determinism;
mod test_factory;
