pub mod chat;
pub mod documents;
pub mod settings;

use crate::controller::Controller;
use crate::db::Database;
use std::path::PathBuf;

pub struct AppState {
    pub controller: Controller,
    pub db: Database,
    pub data_dir: PathBuf,
}
