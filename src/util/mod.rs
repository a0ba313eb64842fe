//! Utility modules

pub mod file_tree;
pub mod paths;

pub use file_tree::{build_file_tree, FileTreeNode, NodeKind};
pub use paths::{config_path, data_dir, init_data_dir, log_file_path, logs_dir};
