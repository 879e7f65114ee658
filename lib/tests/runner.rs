use std::path::PathBuf;

#[test]
fn test_no_forgotten_test_files() {
    let test_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    testutils::assert_no_forgotten_test_files(&test_dir);
}

mod test_evolution;
mod test_transaction;
