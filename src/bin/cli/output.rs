//! Output formatting for CLI operations.

use zipkit::progress::format_bytes_iec;
use zipkit::{EditResult, EncryptionMethod, Entry};

/// Formats a list of entries as a table
pub fn format_list(entries: &[Entry], technical: bool) -> String {
    let mut output = String::new();

    // Header
    if technical {
        output.push_str(&format!(
            "{:>12} {:>12} {:>8} {:>8} {:>19} {:>8} {}\n",
            "Size", "Packed", "Method", "Crypt", "Modified", "CRC", "Name"
        ));
    } else {
        output.push_str(&format!("{:>12} {:>19} {}\n", "Size", "Modified", "Name"));
    }
    output.push_str(&"-".repeat(70));
    output.push('\n');

    let mut total_size: u64 = 0;
    let mut total_packed: u64 = 0;
    let mut file_count = 0;
    let mut dir_count = 0;

    for entry in entries {
        if entry.is_directory {
            dir_count += 1;
        } else {
            file_count += 1;
            total_size += entry.size;
            total_packed += entry.compressed_size;
        }

        let size_str = if entry.is_directory {
            String::new()
        } else {
            format_bytes_iec(entry.size)
        };

        if technical {
            let method = entry
                .compression_method()
                .map(|m| m.name().to_string())
                .unwrap_or_else(|_| format!("#{}", entry.method));
            output.push_str(&format!(
                "{:>12} {:>12} {:>8} {:>8} {:>19} {:08X} {}\n",
                size_str,
                format_bytes_iec(entry.compressed_size),
                method,
                encryption_label(entry.encryption),
                entry.modified_dos,
                entry.crc32,
                entry.name
            ));
        } else {
            output.push_str(&format!("{:>12} {:>19} {}\n", size_str, entry.modified_dos, entry.name));
        }
    }

    // Footer
    output.push_str(&"-".repeat(70));
    output.push('\n');
    output.push_str(&format!(
        "{} files, {} directories, {} total",
        file_count,
        dir_count,
        format_bytes_iec(total_size)
    ));
    if technical && total_size > 0 {
        output.push_str(&format!(
            ", {:.1}% saved",
            (1.0 - total_packed as f64 / total_size as f64) * 100.0
        ));
    }
    output.push('\n');

    output
}

fn encryption_label(method: EncryptionMethod) -> &'static str {
    match method {
        EncryptionMethod::None => "-",
        EncryptionMethod::ZipCrypto => "zipcrypto",
        EncryptionMethod::Aes(strength) => match strength.bits() {
            128 => "aes128",
            192 => "aes192",
            _ => "aes256",
        },
    }
}

/// One-line summary of a rewrite
pub fn format_edit_result(result: &EditResult) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (result.entries_added, "added"),
        (result.entries_replaced, "replaced"),
        (result.entries_renamed, "renamed"),
        (result.entries_removed, "removed"),
    ] {
        if count > 0 {
            parts.push(format!("{} {}", count, label));
        }
    }
    if parts.is_empty() {
        parts.push("no changes".to_string());
    }
    format!("{} ({} entries total)", parts.join(", "), result.total_entries())
}
