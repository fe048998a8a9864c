use serde::Serialize;

use crate::files::repo::{File, FileStats};

#[derive(Debug, Serialize)]
pub struct ProjectFilesResponse {
    pub files: Vec<File>,
    pub stats: FileStats,
}
