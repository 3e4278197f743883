//! Parsing of long-format `LIST` lines.
//!
//! Servers answer `LIST` in whatever their platform prints: the Unix
//! `ls -l` format or the Windows/DOS directory format. Both are handled;
//! anything else surfaces as an unparsable line and is skipped. Unix
//! names may contain spaces, so the line is cut into eight
//! whitespace-separated fields and the remainder is the name.

use crate::client::DirEntry;

/// Parses one `LIST` line; `None` for unparsable lines and non-file,
/// non-directory entries.
pub(crate) fn parse_line(line: &str) -> Option<DirEntry> {
    parse_unix(line).or_else(|| parse_windows(line))
}

fn parse_unix(line: &str) -> Option<DirEntry> {
    let line = line.trim_end();
    let kind = line.chars().next()?;
    if kind != '-' && kind != 'd' {
        return None;
    }

    let mut rest = line;
    let mut size = 0u64;
    for field_index in 0..8 {
        let trimmed = rest.trim_start();
        let end = trimmed.find(char::is_whitespace)?;
        if field_index == 4 {
            size = trimmed[..end].parse().ok()?;
        }
        rest = &trimmed[end..];
    }
    let name = rest.trim_start();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    Some(DirEntry {
        name: name.to_string(),
        size,
        is_dir: kind == 'd',
    })
}

/// `01-23-26  10:15AM  <DIR>  logs` / `01-23-26  10:15PM  4096 report.csv`
fn parse_windows(line: &str) -> Option<DirEntry> {
    let (date, rest) = split_field(line.trim())?;
    if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit() || c == '-') || date.matches('-').count() != 2 {
        return None;
    }
    let (time, rest) = split_field(rest)?;
    if !time.ends_with("AM") && !time.ends_with("PM") {
        return None;
    }
    let (size_or_dir, rest) = split_field(rest)?;
    let name = rest.trim_start();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    if size_or_dir == "<DIR>" {
        return Some(DirEntry {
            name: name.to_string(),
            size: 0,
            is_dir: true,
        });
    }
    let size = size_or_dir.parse().ok()?;
    Some(DirEntry {
        name: name.to_string(),
        size,
        is_dir: false,
    })
}

fn split_field(s: &str) -> Option<(&str, &str)> {
    let trimmed = s.trim_start();
    let end = trimmed.find(char::is_whitespace)?;
    Some((&trimmed[..end], &trimmed[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_unix_files_and_directories() {
        let file = parse_line("-rw-r--r--   1 ftp ftp      4096 Mar 01 12:30 report.csv").unwrap();
        assert_eq!(
            file,
            DirEntry {
                name: "report.csv".to_string(),
                size: 4096,
                is_dir: false
            }
        );

        let dir = parse_line("drwxr-xr-x   2 ftp ftp       512 Mar 01 12:30 archive").unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.name, "archive");
    }

    #[test]
    fn keeps_spaces_in_unix_names() {
        let entry = parse_line("-rw-r--r--   1 ftp ftp        10 Jan 15  2025 quarterly report.txt").unwrap();
        assert_eq!(entry.name, "quarterly report.txt");
    }

    #[test]
    fn parses_windows_listings() {
        let dir = parse_line("01-23-26  10:15AM       <DIR>          logs").unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.name, "logs");

        let file = parse_line("01-23-26  10:15PM             4096 quarterly report.csv").unwrap();
        assert_eq!(
            file,
            DirEntry {
                name: "quarterly report.csv".to_string(),
                size: 4096,
                is_dir: false
            }
        );
    }

    #[test]
    fn skips_links_dots_and_noise() {
        assert!(parse_line("lrwxrwxrwx   1 ftp ftp         9 Jan 01 00:00 link -> tgt").is_none());
        assert!(parse_line("total 12").is_none());
        assert!(parse_line("drwxr-xr-x   2 ftp ftp       512 Mar 01 12:30 .").is_none());
        assert!(parse_line("01-23-26  10:15AM       <DIR>          .").is_none());
        assert!(parse_line("").is_none());
    }
}
