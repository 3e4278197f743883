#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! Black-box conformance suite for libvfs storage backends.
//!
//! Any backend that claims to implement the libvfs interfaces must pass
//! this suite. A backend's integration tests construct a [`Conformance`]
//! around a scratch namespace and call [`Conformance::run_all`], or the
//! individual suites when only part of the surface applies:
//!
//! ```no_run
//! # async fn demo(fs: std::sync::Arc<dyn libvfs::FileSystem>) {
//! use vfs_conformance::{Conformance, Flags};
//!
//! let mut suite = Conformance::new(fs, "", "/scratch/").with_flags(Flags {
//!     location_exists_requires_entry: true,
//!     ..Flags::default()
//! });
//! suite.run_all().await;
//! # }
//! ```
//!
//! Every check panics with a descriptive assertion on violation, so the
//! suite composes with any test harness. A small set of [`Flags`] lets a
//! backend opt out of corner cases its wire protocol physically cannot
//! satisfy; everything else is mandatory.

use libvfs::{File, FileSystem, Location};
use pretty_assertions::assert_eq;
use regex::Regex;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

mod events;

pub use events::{Event, EventKind};

/// Opt-outs for corner cases a backend cannot express.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    /// Skip the check that re-touching an existing file advances its
    /// modification time. For backends that do not update mtime on
    /// identical re-uploads.
    pub skip_touch_timestamp: bool,
    /// The backend has no empty-directory entities: a location only
    /// exists once a file exists under it, and deleting the last file
    /// makes it vanish again.
    pub location_exists_requires_entry: bool,
    /// Skip checks that rely on sub-second timestamp resolution.
    pub coarse_timestamps: bool,
}

/// A conformance run against one backend namespace.
///
/// The `root` location is treated as scratch space: the suite creates and
/// deletes files underneath it freely.
pub struct Conformance {
    fs: Arc<dyn FileSystem>,
    authority: String,
    root: String,
    flags: Flags,
    journal: Vec<Event>,
}

impl Conformance {
    /// Creates a suite for `fs`, addressing everything under `root`
    /// (an absolute location path with trailing slash) at `authority`.
    pub fn new(fs: Arc<dyn FileSystem>, authority: impl Into<String>, root: impl Into<String>) -> Conformance {
        Conformance {
            fs,
            authority: authority.into(),
            root: root.into(),
            flags: Flags::default(),
            journal: Vec::new(),
        }
    }

    /// Replaces the opt-out flags.
    pub fn with_flags(mut self, flags: Flags) -> Conformance {
        self.flags = flags;
        self
    }

    /// The mutation journal accumulated so far, for diagnostics.
    pub fn journal(&self) -> &[Event] {
        &self.journal
    }

    /// Runs every suite. Panics on the first violation.
    pub async fn run_all(&mut self) {
        self.location_semantics().await;
        self.file_io_sequences().await;
        self.copy_and_move().await;
        self.uri_properties().await;

        // The journal doubles as a self-check that the suite exercised
        // every mutation class.
        for kind in [EventKind::Created, EventKind::Modified, EventKind::Deleted, EventKind::Renamed] {
            assert!(self.journal.iter().any(|e| e.kind == kind), "suite never produced a {kind:?} mutation");
        }
        tracing::debug!(scheme = self.fs.scheme(), mutations = self.journal.len(), "conformance suite passed");
    }

    fn location(&self, rel: &str) -> Box<dyn Location> {
        self.fs
            .clone()
            .location(&self.authority, &format!("{}{rel}", self.root))
            .expect("scratch location must construct")
    }

    fn file(&self, rel: &str) -> Box<dyn File> {
        self.fs
            .clone()
            .file(&self.authority, &format!("{}{rel}", self.root))
            .expect("scratch file must construct")
    }

    async fn put(&mut self, rel: &str, content: &[u8]) -> Box<dyn File> {
        let mut file = self.file(rel);
        let existed = file.exists().await.expect("exists");
        let mut written = 0;
        while written < content.len() {
            written += file.write(&content[written..]).await.expect("write");
        }
        file.close().await.expect("close after write");
        self.journal.push(Event::new(
            file.uri(),
            if existed { EventKind::Modified } else { EventKind::Created },
            HashMap::from([("bytes".to_string(), content.len().to_string())]),
        ));
        file
    }

    async fn read_back(&self, rel: &str) -> Vec<u8> {
        let mut file = self.file(rel);
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        file.close().await.expect("close after read");
        out
    }

    async fn remove(&mut self, rel: &str) {
        let mut file = self.file(rel);
        file.delete().await.expect("delete");
        self.journal.push(Event::new(file.uri(), EventKind::Deleted, HashMap::new()));
    }

    /// Location invariants and listing semantics.
    pub async fn location_semantics(&mut self) {
        let loc = self.location("list/");
        assert!(loc.path().starts_with('/') && loc.path().ends_with('/'), "location path invariant broken: {}", loc.path());

        // A path nobody ever wrote to lists empty with no error and does
        // not exist.
        assert_eq!(loc.list().await.expect("list of absent location"), Vec::<String>::new());
        assert!(!loc.exists().await.expect("exists of absent location"));

        self.put("list/alpha.txt", b"a").await;
        self.put("list/beta.txt", b"b").await;
        self.put("list/beta.log", b"b").await;
        self.put("list/sub/gamma.txt", b"g").await;

        let mut names = loc.list().await.expect("list");
        names.sort();
        // Files only: the `sub` directory must not appear, nor its contents.
        assert_eq!(names, vec!["alpha.txt".to_string(), "beta.log".to_string(), "beta.txt".to_string()]);

        let mut by_prefix = loc.list_by_prefix("beta").await.expect("list_by_prefix");
        by_prefix.sort();
        assert_eq!(by_prefix, vec!["beta.log".to_string(), "beta.txt".to_string()]);

        // A prefix with a slash addresses a relative subdirectory.
        assert_eq!(loc.list_by_prefix("sub/gam").await.expect("nested prefix"), vec!["gamma.txt".to_string()]);

        let re = Regex::new(r"[ab].*\.txt").expect("regex");
        let mut by_regex = loc.list_by_regex(&re).await.expect("list_by_regex");
        by_regex.sort();
        assert_eq!(by_regex, vec!["alpha.txt".to_string(), "beta.txt".to_string()]);

        // Full match only: "beta.log" matches "beta" nowhere as a whole.
        let re = Regex::new("beta").expect("regex");
        assert_eq!(loc.list_by_regex(&re).await.expect("anchored regex"), Vec::<String>::new());

        assert!(loc.exists().await.expect("exists after writes"));

        // Derivation rules.
        let sub = loc.location("sub/").expect("relative location");
        assert_eq!(sub.list().await.expect("sub list"), vec!["gamma.txt".to_string()]);
        assert!(loc.location("/absolute/").is_err(), "absolute relative-location must fail");
        assert!(loc.file("").is_err(), "empty relative file must fail");
        assert!(loc.file("/etc/passwd").is_err(), "absolute relative-file must fail");
        assert!(loc.file("trailing/").is_err(), "slash-terminated relative-file must fail");

        // Escapes above the root are rejected at derivation time.
        let escape = "../".repeat(24) + "x/";
        assert!(loc.location(&escape).is_err(), "escape above / must fail");

        loc.delete_file("alpha.txt").await.expect("delete_file");
        self.journal.push(Event::new(loc.uri(), EventKind::Deleted, HashMap::new()));
        let mut names = loc.list().await.expect("list after delete");
        names.sort();
        assert_eq!(names, vec!["beta.log".to_string(), "beta.txt".to_string()]);

        self.remove("list/beta.txt").await;
        self.remove("list/beta.log").await;
        self.remove("list/sub/gamma.txt").await;

        if self.flags.location_exists_requires_entry {
            // Object stores have no empty-directory entity left behind.
            assert!(!loc.exists().await.expect("exists after emptying"));
        }
    }

    /// The read/write/seek/mode-upgrade matrix of the file handle.
    pub async fn file_io_sequences(&mut self) {
        // Write then read back.
        let payload = b"the quick brown fox jumps over the lazy dog";
        self.put("io/plain.txt", payload).await;
        assert_eq!(self.read_back("io/plain.txt").await, payload);

        // A fresh write replaces the remote content entirely.
        self.put("io/trunc.txt", b"ABCDEFGH").await;
        self.put("io/trunc.txt", b"xy").await;
        assert_eq!(self.read_back("io/trunc.txt").await, b"xy");

        // Mode upgrade: read four, write two, the rest stays.
        self.put("io/upgrade.txt", b"ABCDEFGH").await;
        let mut file = self.file("io/upgrade.txt");
        let mut buf = [0u8; 4];
        file.read(&mut buf).await.expect("read 4");
        assert_eq!(&buf, b"ABCD");
        assert_eq!(file.cursor(), 4);
        file.write(b"xy").await.expect("write after read");
        file.close().await.expect("close");
        self.journal.push(Event::new(file.uri(), EventKind::Modified, HashMap::new()));
        assert_eq!(self.read_back("io/upgrade.txt").await, b"ABCDxyGH");

        // Seek then write edits in place without truncation.
        self.put("io/inplace.txt", b"ABCDEFGH").await;
        let mut file = self.file("io/inplace.txt");
        assert_eq!(file.seek(SeekFrom::Start(4)).await.expect("seek"), 4);
        file.write(b"zz").await.expect("write after seek");
        file.close().await.expect("close");
        assert_eq!(self.read_back("io/inplace.txt").await, b"ABCDzzGH");

        // EOF is sticky until a seek lands strictly inside the file.
        let mut file = self.file("io/inplace.txt");
        let mut all = vec![0u8; 64];
        let mut seen = 0;
        loop {
            let n = file.read(&mut all[seen..]).await.expect("read to eof");
            if n == 0 {
                break;
            }
            seen += n;
        }
        assert_eq!(seen, 8);
        assert_eq!(file.read(&mut all).await.expect("read at eof"), 0, "eof must stay sticky");
        file.seek(SeekFrom::Start(6)).await.expect("seek inside");
        let n = file.read(&mut all).await.expect("read after eof reset");
        assert_eq!(n, 2);
        assert_eq!(&all[..2], b"GH");

        // Seek from the end.
        file.seek(SeekFrom::End(-4)).await.expect("seek from end");
        let n = file.read(&mut all).await.expect("read tail");
        assert_eq!(&all[..n], b"zzGH");
        file.close().await.expect("close");

        // Reads on a missing remote object surface not-found; the handle
        // itself constructs without I/O.
        let mut absent = self.file("io/never-written.txt");
        assert!(!absent.exists().await.expect("exists"));
        let err = absent.read(&mut buf).await.expect_err("read of absent file");
        assert!(err.is_not_found(), "expected not-found, got {err}");

        // Touch vivifies, including intermediate directories.
        let mut touched = self.file("io/deep/nested/touched.txt");
        touched.touch().await.expect("touch");
        self.journal.push(Event::new(touched.uri(), EventKind::Created, HashMap::new()));
        assert!(touched.exists().await.expect("exists after touch"));
        assert_eq!(touched.size().await.expect("size after touch"), 0);

        if !self.flags.skip_touch_timestamp {
            let before = touched.last_modified().await.expect("mtime");
            let wait = if self.flags.coarse_timestamps { 1100 } else { 20 };
            tokio::time::sleep(std::time::Duration::from_millis(wait)).await;
            touched.touch().await.expect("re-touch");
            let after = touched.last_modified().await.expect("mtime after re-touch");
            assert!(after > before, "touch must advance mtime ({before:?} -> {after:?})");
        }

        // Size and modification time of real content.
        let sized = self.put("io/sized.bin", &[7u8; 4096]).await;
        assert_eq!(sized.size().await.expect("size"), 4096);
        let modified = sized.last_modified().await.expect("last_modified");
        assert!(modified <= SystemTime::now() + std::time::Duration::from_secs(5));

        // Delete is terminal.
        self.remove("io/sized.bin").await;
        let file = self.file("io/sized.bin");
        assert!(!file.exists().await.expect("exists after delete"));
    }

    /// Copy and move semantics, including the sentinel refusal.
    pub async fn copy_and_move(&mut self) {
        let mut payload = vec![0u8; 96 * 1024];
        getrandom::fill(&mut payload).expect("random payload");

        self.put("copy/src.bin", &payload).await;

        // Copy twice; both targets identical, source untouched.
        let mut src = self.file("copy/src.bin");
        let mut dst_one = self.file("copy/dst-one.bin");
        src.copy_to_file(dst_one.as_mut()).await.expect("first copy");
        self.journal.push(Event::new(dst_one.uri(), EventKind::Created, HashMap::new()));

        let mut src = self.file("copy/src.bin");
        let mut dst_two = self.file("copy/dst-two.bin");
        src.copy_to_file(dst_two.as_mut()).await.expect("second copy");

        assert_eq!(self.read_back("copy/dst-one.bin").await, payload);
        assert_eq!(self.read_back("copy/dst-two.bin").await, payload);
        assert_eq!(self.read_back("copy/src.bin").await, payload);

        // A moved cursor refuses the copy with the well-known sentinel.
        let mut src = self.file("copy/src.bin");
        let mut one = [0u8; 1];
        src.read(&mut one).await.expect("read one");
        let mut dst = self.file("copy/dst-refused.bin");
        let err = src.copy_to_file(dst.as_mut()).await.expect_err("copy with cursor ahead");
        assert!(err.is_copy_refused(), "expected the copy-refused sentinel, got {err}");
        src.close().await.expect("close");
        assert!(!self.file("copy/dst-refused.bin").exists().await.expect("exists"), "refused copy must not create the target");

        // An empty source still materializes its target: nothing is ever
        // written, so the engine touches the target into existence.
        let mut empty = self.file("copy/empty.bin");
        empty.touch().await.expect("create empty source");
        self.journal.push(Event::new(empty.uri(), EventKind::Created, HashMap::new()));
        let mut empty_copy = self.file("copy/empty-copy.bin");
        empty.copy_to_file(empty_copy.as_mut()).await.expect("copy empty source");
        assert!(self.file("copy/empty-copy.bin").exists().await.expect("exists"), "empty copy must create the target");
        assert_eq!(self.file("copy/empty-copy.bin").size().await.expect("size"), 0);
        self.remove("copy/empty.bin").await;
        self.remove("copy/empty-copy.bin").await;

        // Copy into a location keeps the basename.
        let mut src = self.file("copy/src.bin");
        let target = self.location("copy/into/");
        let copied = src.copy_to_location(target.as_ref()).await.expect("copy_to_location");
        assert_eq!(copied.name(), "src.bin");
        assert_eq!(self.read_back("copy/into/src.bin").await, payload);

        // Move within one authority: source disappears, bytes survive.
        let mut src = self.file("copy/into/src.bin");
        let mut moved = self.file("copy/moved.bin");
        src.move_to_file(moved.as_mut()).await.expect("move_to_file");
        self.journal.push(Event::new(moved.uri(), EventKind::Renamed, HashMap::new()));
        assert!(!self.file("copy/into/src.bin").exists().await.expect("source gone"));
        assert_eq!(self.read_back("copy/moved.bin").await, payload);

        // Move onto an existing file replaces it.
        self.put("copy/existing.bin", b"old bytes").await;
        let mut src = self.file("copy/moved.bin");
        let mut dst = self.file("copy/existing.bin");
        src.move_to_file(dst.as_mut()).await.expect("move onto existing");
        assert_eq!(self.read_back("copy/existing.bin").await, payload);

        // Move to a location keeps the basename and vivifies parents.
        let mut src = self.file("copy/existing.bin");
        let deep = self.location("copy/deep/deeper/");
        let moved = src.move_to_location(deep.as_ref()).await.expect("move_to_location");
        assert_eq!(moved.name(), "existing.bin");
        assert_eq!(self.read_back("copy/deep/deeper/existing.bin").await, payload);

        self.remove("copy/src.bin").await;
        self.remove("copy/dst-one.bin").await;
        self.remove("copy/dst-two.bin").await;
        self.remove("copy/deep/deeper/existing.bin").await;
    }

    /// Moves a two-megabyte file onto `other`, exercising the buffered
    /// fallback when the fixtures live under different authorities or
    /// schemes.
    pub async fn move_between(&mut self, other: &mut Conformance) {
        let mut payload = vec![0u8; 2 * 1024 * 1024];
        getrandom::fill(&mut payload).expect("random payload");

        self.put("across/source.bin", &payload).await;

        let mut src = self.file("across/source.bin");
        let mut dst = other.file("across/target.bin");
        src.move_to_file(dst.as_mut()).await.expect("cross-fixture move");
        self.journal.push(Event::new(dst.uri(), EventKind::Renamed, HashMap::new()));

        assert!(!self.file("across/source.bin").exists().await.expect("source gone"));
        assert_eq!(other.read_back("across/target.bin").await, payload);

        other.remove("across/target.bin").await;
    }

    /// URI round-trip and naming properties.
    pub async fn uri_properties(&mut self) {
        let file = self.file("uri/nested/name.txt");
        let uri = file.uri();
        assert!(!uri.ends_with('/'));

        let parsed = libvfs::uri::parse(&uri).expect("file uri parses");
        assert_eq!(parsed.scheme, self.fs.scheme());
        assert_eq!(parsed.path, file.path());
        assert_eq!(&parsed.authority, file.authority());

        assert_eq!(file.name(), "name.txt");
        let holder = file.location();
        assert!(holder.path().ends_with("/nested/"));
        assert_eq!(format!("{}{}", holder.path(), file.name()), file.path());

        let loc = self.location("uri/");
        let parsed = libvfs::uri::parse(&loc.uri()).expect("location uri parses");
        assert!(parsed.is_location);
        assert_eq!(parsed.path, loc.path());
    }
}
