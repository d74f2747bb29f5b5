//! Command implementations for the CLI tool.

use std::path::{Path, PathBuf};

use zipkit::{EditResult, ExtractOptions, Operation, Result, ZipFile, ZipParameters};

use crate::exit_codes::{ExitCode, report};
use crate::output::{format_edit_result, format_list};
use crate::password::{get_or_confirm_password, get_password};
use crate::progress;
use crate::{Encryption, Method, OverwriteMode};

/// Configuration for the add command.
pub struct AddConfig<'a> {
    pub archive_path: &'a Path,
    pub files: &'a [PathBuf],
    pub method: Method,
    pub level: u32,
    pub encryption: Encryption,
    pub password: Option<String>,
    pub root: Option<&'a str>,
    pub split: Option<u64>,
    pub quiet: bool,
}

/// Configuration for the extract command.
pub struct ExtractConfig<'a> {
    pub archive_path: &'a Path,
    pub entries: &'a [String],
    pub output_dir: &'a Path,
    pub overwrite: OverwriteMode,
    pub password: Option<String>,
    pub quiet: bool,
}

/// Opens an archive, asking for a password if it has encrypted entries
fn open_archive(path: &Path, password: Option<String>) -> std::result::Result<ZipFile, ExitCode> {
    let mut zip = ZipFile::open(path).map_err(|e| report(&e))?;
    if let Some(pwd) = get_password(password, zip.is_encrypted()) {
        zip.set_password(pwd);
    }
    Ok(zip)
}

fn finish<T>(result: Result<T>, on_success: impl FnOnce(T)) -> ExitCode {
    match result {
        Ok(value) => {
            on_success(value);
            ExitCode::Success
        }
        Err(e) => report(&e),
    }
}

fn print_edit(result: EditResult, quiet: bool) {
    if !quiet {
        println!("{}", format_edit_result(&result));
    }
}

/// List command implementation
pub fn list(archive_path: &Path, technical: bool) -> ExitCode {
    let zip = match ZipFile::open(archive_path) {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    print!("{}", format_list(zip.entries(), technical));
    let comment = zip.comment();
    if !comment.is_empty() {
        println!("Comment: {}", comment);
    }
    if zip.is_split() {
        println!("Volumes: {}", zip.split_files().len());
    }
    ExitCode::Success
}

/// Add command implementation
pub fn add(config: &AddConfig<'_>) -> ExitCode {
    let mut params = ZipParameters::new()
        .compression(config.method.into())
        .encryption(config.encryption.into());
    params = match params.level(config.level) {
        Ok(p) => p,
        Err(e) => return report(&e),
    };
    if let Some(root) = config.root {
        params = params.root_folder(root);
    }

    let opened = match config.split {
        Some(size) => ZipFile::create_split(config.archive_path, size),
        None => ZipFile::create(config.archive_path),
    };
    let mut zip = match opened {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    if config.encryption != Encryption::None {
        match get_or_confirm_password(config.password.clone()) {
            Some(pwd) => zip.set_password(pwd),
            None => {
                eprintln!("Error: encryption needs a password");
                return ExitCode::BadArgs;
            }
        }
    }

    let mut operations = Vec::new();
    for file in config.files {
        match Operation::add_path(file, &params) {
            Ok(ops) => operations.extend(ops),
            Err(e) => return report(&e),
        }
    }

    let (_, result) = progress::run(zip, "Adding", config.quiet, move |zip| zip.apply(operations));
    finish(result, |r| print_edit(r, config.quiet))
}

/// Extract command implementation
pub fn extract(config: &ExtractConfig<'_>) -> ExitCode {
    let zip = match open_archive(config.archive_path, config.password.clone()) {
        Ok(zip) => zip,
        Err(code) => return code,
    };

    let options = ExtractOptions::new().overwrite(config.overwrite.into());
    let output = config.output_dir.to_path_buf();
    let entries = config.entries.to_vec();

    let (zip, result) = progress::run(zip, "Extracting", config.quiet, move |zip| {
        if entries.is_empty() {
            return zip.extract_all_with(&output, &options);
        }
        for name in &entries {
            zip.extract_file_with(name, &output, None, &options)?;
        }
        Ok(())
    });
    finish(result, |()| {
        if !config.quiet {
            println!("Extracted to {} ({} entries in archive)", config.output_dir.display(), zip.entry_count());
        }
    })
}

/// Test command implementation
pub fn test(archive_path: &Path, password: Option<String>, quiet: bool) -> ExitCode {
    let zip = match open_archive(archive_path, password) {
        Ok(zip) => zip,
        Err(code) => return code,
    };

    let count = zip.entry_count();
    let (_, result) = progress::run(zip, "Testing", quiet, |zip| zip.test_archive());
    finish(result, |()| println!("Everything is Ok ({} entries)", count))
}

/// Remove command implementation
pub fn remove(archive_path: &Path, entries: &[String], quiet: bool) -> ExitCode {
    let zip = match ZipFile::open(archive_path) {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    let operations = entries
        .iter()
        .map(|name| Operation::Remove { name: name.clone() })
        .collect::<Vec<_>>();
    let (_, result) = progress::run(zip, "Removing", quiet, move |zip| zip.apply(operations));
    finish(result, |r| print_edit(r, quiet))
}

/// Rename command implementation
pub fn rename(archive_path: &Path, from: &str, to: &str, quiet: bool) -> ExitCode {
    let zip = match ZipFile::open(archive_path) {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    let operation = Operation::Rename {
        from: from.to_string(),
        to: to.to_string(),
    };
    let (_, result) = progress::run(zip, "Renaming", quiet, move |zip| zip.apply(vec![operation]));
    finish(result, |r| print_edit(r, quiet))
}

/// Comment command implementation
pub fn comment(archive_path: &Path, text: Option<&str>) -> ExitCode {
    let mut zip = match ZipFile::open(archive_path) {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    match text {
        Some(text) => finish(zip.set_comment(text), |()| {}),
        None => {
            println!("{}", zip.comment());
            ExitCode::Success
        }
    }
}

/// Split command implementation
pub fn split(archive_path: &Path, output: &Path, size: u64, quiet: bool) -> ExitCode {
    let zip = match ZipFile::open(archive_path) {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    let target = output.to_path_buf();
    let (_, result) = progress::run(zip, "Splitting", quiet, move |zip| zip.split_to(&target, size));
    finish(result, |volumes| {
        for volume in volumes {
            println!("{}", volume.display());
        }
    })
}

/// Merge command implementation
pub fn merge(archive_path: &Path, output: &Path, quiet: bool) -> ExitCode {
    let zip = match ZipFile::open(archive_path) {
        Ok(zip) => zip,
        Err(e) => return report(&e),
    };

    let target = output.to_path_buf();
    let (_, result) = progress::run(zip, "Merging", quiet, move |zip| zip.merge_split_files(&target));
    finish(result, |()| {
        if !quiet {
            println!("Merged into {}", output.display());
        }
    })
}
