//! File system functions for the developer agent, rooted at a working directory.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use swarm::function::AgentFunction;
use walkdir::WalkDir;

/// Resolve `path` against `root` unless it is already absolute
fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn file_tools(root: &Path) -> Vec<AgentFunction> {
    vec![
        list_directory(root.to_path_buf()),
        read_file(root.to_path_buf()),
        edit_file(root.to_path_buf()),
        create_file(root.to_path_buf()),
        delete_file(root.to_path_buf()),
        find_file(root.to_path_buf()),
    ]
}

fn list_directory(root: PathBuf) -> AgentFunction {
    AgentFunction::builder("list_directory")
        .description("List files and directories in the given path.")
        .param_with_default::<String>("path", json!("."))
        .build(move |args| {
            let path = resolve_path(&root, args.str("path")?);
            let mut names = fs::read_dir(&path)
                .with_context(|| format!("Error listing directory {}", path.display()))?
                .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
                .collect::<std::io::Result<Vec<_>>>()?;
            names.sort();
            Ok(names.join("\n"))
        })
}

fn read_file(root: PathBuf) -> AgentFunction {
    AgentFunction::builder("read_file")
        .description("Read and return the contents of a file.")
        .param::<String>("filename")
        .build(move |args| {
            let path = resolve_path(&root, args.str("filename")?);
            fs::read_to_string(&path)
                .with_context(|| format!("Error reading file {}", path.display()))
        })
}

fn edit_file(root: PathBuf) -> AgentFunction {
    AgentFunction::builder("edit_file")
        .description("Replace the contents of an existing file.")
        .param::<String>("filename")
        .param::<String>("content")
        .build(move |args| {
            let filename = args.str("filename")?;
            let path = resolve_path(&root, filename);
            if !path.is_file() {
                anyhow::bail!("File {} does not exist, create it first", filename);
            }
            fs::write(&path, args.str("content")?)
                .with_context(|| format!("Error editing file {}", path.display()))?;
            Ok(format!("File {} has been updated.", filename))
        })
}

fn create_file(root: PathBuf) -> AgentFunction {
    AgentFunction::builder("create_file")
        .description("Create a new file with optional content.")
        .param::<String>("filename")
        .param_with_default::<String>("content", json!(""))
        .build(move |args| {
            let filename = args.str("filename")?;
            let path = resolve_path(&root, filename);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, args.str("content")?)
                .with_context(|| format!("Error creating file {}", path.display()))?;
            Ok(format!("File {} has been created.", filename))
        })
}

fn delete_file(root: PathBuf) -> AgentFunction {
    AgentFunction::builder("delete_file")
        .description("Delete a file.")
        .param::<String>("filename")
        .build(move |args| {
            let filename = args.str("filename")?;
            let path = resolve_path(&root, filename);
            fs::remove_file(&path)
                .with_context(|| format!("Error deleting file {}", path.display()))?;
            Ok(format!("File {} has been deleted.", filename))
        })
}

fn find_file(root: PathBuf) -> AgentFunction {
    AgentFunction::builder("find_file")
        .description("Find a file in the working directory and its subdirectories.")
        .param::<String>("filename")
        .build(move |args| {
            let filename = args.str("filename")?;
            let found = WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .find(|entry| entry.file_type().is_file() && entry.file_name() == filename);

            Ok(match found {
                Some(entry) => {
                    let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                    format!("File {} found at: {}", filename, relative.display())
                }
                None => format!(
                    "File {} not found in the working directory or its subdirectories.",
                    filename
                ),
            })
        })
}
