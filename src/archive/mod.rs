//! Serves the contents of a zip file as a read-only tree of directories and files.
//!
//! The zip is opened per request on a blocking thread and closed once its answer is complete, so no handle outlives a request.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use futures::stream::{self, BoxStream, StreamExt as _};
use tokio::sync::{mpsc, oneshot};
use tokio_util::bytes::Bytes;
use tracing::{debug, error};
use zip::ZipArchive;

use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 64 * 1024;

/// What a path inside a zip refers to.
#[non_exhaustive]
#[derive(Debug)]
pub enum Entry {
    /// A regular file.
    File(FileContent),
    /// A directory, with its immediate children.
    Directory(Vec<Child>),
    /// Nothing.
    Absent,
}

/// The content of a file inside a zip, streamed as it is decompressed.
pub struct FileContent {
    /// The MIME type, guessed from the file name or sniffed from the content.
    pub content_type: String,
    /// The uncompressed size in bytes.
    pub size: u64,
    /// The uncompressed bytes.
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContent")
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// An immediate child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    /// The name of the child, without any separator.
    pub name: String,
    /// Whether the child is a directory.
    pub is_dir: bool,
}

impl Child {
    /// The relative link to the child, with a trailing `/` for directories.
    pub fn href(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Where a path points inside an archive, in terms of entry indices.
#[derive(Debug, PartialEq, Eq)]
enum Located {
    File(usize),
    Directory(Vec<Child>),
    Absent,
}

enum Head {
    File { content_type: String, size: u64 },
    Directory(Vec<Child>),
    Absent,
}

/// Looks up the path made of `segments` in the zip at `zip`.
///
/// # Errors
///
/// Returns an error if the zip cannot be opened or read.
pub async fn open(zip: &Path, segments: &[String]) -> Result<Entry> {
    let (head_tx, head_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(4);

    let zip = zip.to_owned();
    let segments = segments.to_vec();
    tokio::task::spawn_blocking(move || read(&zip, &segments, head_tx, &chunk_tx));

    match head_rx.await {
        Ok(Ok(Head::File { content_type, size })) => {
            let body = stream::unfold(chunk_rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (chunk, rx))
            })
            .boxed();
            Ok(Entry::File(FileContent {
                content_type,
                size,
                body,
            }))
        }
        Ok(Ok(Head::Directory(children))) => Ok(Entry::Directory(children)),
        Ok(Ok(Head::Absent)) => Ok(Entry::Absent),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(Error::Internal(anyhow::anyhow!(
            "zip reader stopped without an answer"
        ))),
    }
}

/// Runs on a blocking thread: answers `head` once, then streams the file content, if any, into `chunks`.
fn read(
    zip: &Path,
    segments: &[String],
    head: oneshot::Sender<Result<Head>>,
    chunks: &mpsc::Sender<io::Result<Bytes>>,
) {
    let mut archive = match File::open(zip)
        .map_err(Error::from)
        .and_then(|file| ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(zip, e)))
    {
        Ok(archive) => archive,
        Err(err) => {
            drop(head.send(Err(err)));
            return;
        }
    };

    let names: Vec<(usize, String)> = (0..archive.len())
        .filter_map(|index| {
            archive
                .name_for_index(index)
                .map(|name| (index, name.to_owned()))
        })
        .collect();

    let index = match locate(names.iter().map(|(i, n)| (*i, n.as_str())), segments) {
        Located::File(index) => index,
        Located::Directory(children) => {
            drop(head.send(Ok(Head::Directory(children))));
            return;
        }
        Located::Absent => {
            drop(head.send(Ok(Head::Absent)));
            return;
        }
    };

    let mut file = match archive.by_index(index) {
        Ok(file) => file,
        Err(err) => {
            drop(head.send(Err(zip_error(zip, err))));
            return;
        }
    };
    let size = file.size();
    let name = file.name().to_owned();

    let mut first = vec![0; CHUNK_SIZE];
    let filled = match fill(&mut file, &mut first) {
        Ok(filled) => filled,
        Err(err) => {
            drop(head.send(Err(err.into())));
            return;
        }
    };
    first.truncate(filled);

    let content_type = content_type(&name, &first);
    debug!("serving {name} ({size} bytes, {content_type}) from {zip:?}");
    if head.send(Ok(Head::File { content_type, size })).is_err() {
        return;
    }
    if filled == 0 || chunks.blocking_send(Ok(Bytes::from(first))).is_err() {
        return;
    }

    loop {
        let mut buffer = vec![0; CHUNK_SIZE];
        match fill(&mut file, &mut buffer) {
            Ok(0) => return,
            Ok(filled) => {
                buffer.truncate(filled);
                if chunks.blocking_send(Ok(Bytes::from(buffer))).is_err() {
                    // The client went away
                    return;
                }
            }
            Err(err) => {
                error!("failed to read {name} from {zip:?}: {err}");
                drop(chunks.blocking_send(Err(err)));
                return;
            }
        }
    }
}

/// Reads until `buffer` is full or the reader is exhausted.
fn fill(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn zip_error(zip: &Path, err: zip::result::ZipError) -> Error {
    Error::Internal(anyhow::anyhow!("failed to read zip {zip:?}: {err}"))
}

/// Resolves `segments` against the entry names of an archive.
///
/// Directories need not have entries of their own: any entry under `path/` makes `path` a directory.
fn locate<'a, I>(names: I, segments: &[String]) -> Located
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    if segments
        .iter()
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Located::Absent;
    }

    let path = segments.join("/");
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };

    let mut children = BTreeMap::new();
    let mut is_dir = path.is_empty();
    for (index, name) in names {
        let name = name.trim_start_matches('/');
        if !path.is_empty() && name == path {
            return Located::File(index);
        }
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        is_dir = true;
        match rest.split_once('/') {
            Some((child, _)) if !child.is_empty() => {
                children.insert(child.to_owned(), true);
            }
            Some(_) => {}
            None if !rest.is_empty() => {
                children.entry(rest.to_owned()).or_insert(false);
            }
            None => {}
        }
    }

    if is_dir {
        Located::Directory(
            children
                .into_iter()
                .map(|(name, is_dir)| Child { name, is_dir })
                .collect(),
        )
    } else {
        Located::Absent
    }
}

/// Guesses a MIME type from the file name, falling back to sniffing the first bytes.
fn content_type(name: &str, head: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(name).first() {
        return mime.to_string();
    }

    let text = match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character may be cut off at the end of the sniffed bytes
        Err(err) => err.error_len().is_none(),
    };
    if text && !head.contains(&0) {
        String::from("text/plain; charset=utf-8")
    } else {
        String::from("application/octet-stream")
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write as _, path::PathBuf};

    use futures::TryStreamExt as _;
    use zip::{ZipWriter, write::SimpleFileOptions};

    use super::*;

    fn segments(path: &str) -> Vec<String> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn child(name: &str, is_dir: bool) -> Child {
        Child {
            name: name.to_owned(),
            is_dir,
        }
    }

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("fixture.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("file.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"file content").unwrap();
        writer
            .start_file("subdir/subfile.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"subfile content").unwrap();
        writer
            .start_file("large.bin", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&vec![7u8; 3 * CHUNK_SIZE + 5]).unwrap();
        writer.finish().unwrap();
        path
    }

    async fn content(entry: Entry) -> (String, Vec<u8>) {
        match entry {
            Entry::File(file) => {
                let chunks: Vec<Bytes> = file.body.try_collect().await.unwrap();
                (file.content_type, chunks.concat())
            }
            other => panic!("expected a file, got {other:?}"),
        }
    }

    #[test]
    fn locates_implicit_directories() {
        let names = [(0, "a/b/c.txt"), (1, "a/d.txt"), (2, "e.txt")];

        assert_eq!(
            locate(names, &segments("")),
            Located::Directory(vec![child("a", true), child("e.txt", false)])
        );
        assert_eq!(
            locate(names, &segments("a")),
            Located::Directory(vec![child("b", true), child("d.txt", false)])
        );
        assert_eq!(locate(names, &segments("a/d.txt")), Located::File(1));
        assert_eq!(locate(names, &segments("a/x")), Located::Absent);
        assert_eq!(locate(names, &segments("a/../e.txt")), Located::Absent);
    }

    #[test]
    fn locates_explicit_directories() {
        let names = [(0, "empty/"), (1, "full/"), (2, "full/x")];

        assert_eq!(locate(names, &segments("empty")), Located::Directory(vec![]));
        assert_eq!(
            locate(names, &segments("")),
            Located::Directory(vec![child("empty", true), child("full", true)])
        );
        assert_eq!(
            locate(names, &segments("full")),
            Located::Directory(vec![child("x", false)])
        );
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("index.html", b""), "text/html");
        assert_eq!(content_type("style.css", b""), "text/css");
        assert_eq!(
            content_type("LICENSE", b"Permission is hereby granted"),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            content_type("blob", &[0, 1, 2, 0xff]),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn serves_files() {
        let dir = tempfile::tempdir().unwrap();
        let zip = fixture(dir.path());

        let (content_type, bytes) = content(open(&zip, &segments("file.txt")).await.unwrap()).await;
        assert_eq!(content_type, "text/plain");
        assert_eq!(bytes, b"file content");

        let (_, bytes) = content(open(&zip, &segments("subdir/subfile.txt")).await.unwrap()).await;
        assert_eq!(bytes, b"subfile content");

        let (_, bytes) = content(open(&zip, &segments("large.bin")).await.unwrap()).await;
        assert_eq!(bytes.len(), 3 * CHUNK_SIZE + 5);
        assert!(bytes.iter().all(|b| *b == 7));
    }

    #[tokio::test]
    async fn lists_directories() {
        let dir = tempfile::tempdir().unwrap();
        let zip = fixture(dir.path());

        let Entry::Directory(root) = open(&zip, &[]).await.unwrap() else {
            panic!("root should be a directory");
        };
        assert_eq!(
            root,
            [
                child("file.txt", false),
                child("large.bin", false),
                child("subdir", true)
            ]
        );

        let Entry::Directory(subdir) = open(&zip, &segments("subdir")).await.unwrap() else {
            panic!("subdir should be a directory");
        };
        assert_eq!(subdir, [child("subfile.txt", false)]);
        assert_eq!(subdir[0].href(), "subfile.txt");
        assert_eq!(child("subdir", true).href(), "subdir/");
    }

    #[tokio::test]
    async fn reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let zip = fixture(dir.path());

        assert!(matches!(
            open(&zip, &segments("nope.txt")).await.unwrap(),
            Entry::Absent
        ));
        assert!(matches!(
            open(&zip, &segments("file.txt/inner")).await.unwrap(),
            Entry::Absent
        ));
    }

    #[tokio::test]
    async fn broken_zips_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"not a zip").unwrap();

        assert!(open(&path, &[]).await.is_err());
    }
}
