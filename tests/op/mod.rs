pub mod test_hash;
