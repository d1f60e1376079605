mod router;

use crate::{app::App, config::Config};

/// Creates an isolated App using a unique temp directory.
/// Each test gets its own directory so parallel tests never collide,
/// and no real data is touched.
pub fn create_app() -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let config = Config::load_with(tmp.path().to_str().unwrap());
    let app = App::open(&config).expect("failed to open app");
    (app, tmp)
}
