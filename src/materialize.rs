use std::{
    io,
    path::{Path, PathBuf},
};

use futures::future::{FutureExt, LocalBoxFuture};
use regex::Regex;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error, info};

use crate::{
    api::{errors::DownloadError, Context},
    status_bar::StatusBar,
    tree::{File, Folder, Node},
};

/// Fetches the contents of a single document
pub trait Downloader {
    async fn download(&self, context: &Context, document_id: &str) -> Result<Vec<u8>, DownloadError>;
}

/// The parts of the filesystem the materializer touches
pub trait Filesystem {
    async fn exists(&self, path: &Path) -> io::Result<bool>;
    async fn is_dir(&self, path: &Path) -> io::Result<bool>;
    /// Creates the directory and all missing parents, existing directories are fine
    async fn make_dirs(&self, path: &Path) -> io::Result<()>;
    /// Writes (and possibly overwrites) a file
    async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Local disk, via tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn make_dirs(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    /// Writes into a temporary sibling first and moves it in place afterwards,
    /// so an interrupted write never leaves a truncated document behind
    async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp_edoc-dl");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&tmp_path, path).await
    }
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The directory a document should be written to is missing
    #[error("Folder has not been created {} for file {name}", path.display())]
    PreconditionFailure { path: PathBuf, name: String },
    #[error("Could not create folder {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Could not check {}: {source}", path.display())]
    Exists { path: PathBuf, source: io::Error },
    #[error("Could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("File {0} has no document id")]
    MissingDocumentId(String),
    #[error("Error downloading {name}: {source}")]
    Download { name: String, source: DownloadError },
}

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Downloaded to a path that didn't exist before
    New(PathBuf),
    /// Downloaded and replaced an existing file
    Replaced(PathBuf),
    /// Already present and `ignore_existing` was set
    Existing(PathBuf),
    /// Matched one of the file filters
    Filtered(PathBuf),
}

/// Mirrors a forest onto a filesystem
///
/// Nodes are processed strictly one after another, pre-order and left to
/// right. A failing node is logged on the status bar and only its own work
/// is abandoned.
pub struct Materializer<'a, D, F> {
    downloader: &'a D,
    fs: &'a F,
    status_bar: &'a StatusBar,
    file_filters: &'a [Regex],
}

impl<'a, D: Downloader, F: Filesystem> Materializer<'a, D, F> {
    pub fn new(downloader: &'a D, fs: &'a F, status_bar: &'a StatusBar) -> Self {
        Materializer {
            downloader,
            fs,
            status_bar,
            file_filters: &[],
        }
    }

    /// Files whose local name matches one of these are skipped
    pub fn with_file_filters(mut self, file_filters: &'a [Regex]) -> Self {
        self.file_filters = file_filters;
        self
    }

    pub async fn materialize(
        &self,
        context: &Context,
        destination: &Path,
        forest: &[Node],
        ignore_existing: bool,
    ) {
        for node in forest {
            self.materialize_node(context, destination, node, ignore_existing)
                .await;
        }
    }

    fn materialize_node<'b>(
        &'b self,
        context: &'b Context,
        destination: &'b Path,
        node: &'b Node,
        ignore_existing: bool,
    ) -> LocalBoxFuture<'b, ()> {
        async move {
            match node {
                Node::Folder(folder) => match self.create_folder(destination, folder).await {
                    Ok(path) => {
                        for child in &folder.children {
                            self.materialize_node(context, &path, child, ignore_existing)
                                .await;
                        }
                    }
                    Err(e) => {
                        error!("{}", e);
                        self.status_bar.register_err(&e.to_string()).await;
                    }
                },
                Node::File(file) => {
                    info!("Downloading file {}", file.name);
                    match self
                        .materialize_file(context, destination, file, ignore_existing)
                        .await
                    {
                        Ok(outcome) => self.register(&outcome).await,
                        Err(e) => {
                            error!("{}", e);
                            self.status_bar.register_err(&e.to_string()).await;
                        }
                    }
                }
            }
        }
        .boxed_local()
    }

    async fn create_folder(
        &self,
        destination: &Path,
        folder: &Folder,
    ) -> Result<PathBuf, MaterializeError> {
        let path = destination.join(folder.local_name());
        info!("Creating or getting {}", path.display());
        self.fs
            .make_dirs(&path)
            .await
            .map_err(|source| MaterializeError::CreateDir {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Downloads a single file into `destination`
    ///
    /// `destination` has to exist already, it is never created here.
    pub async fn materialize_file(
        &self,
        context: &Context,
        destination: &Path,
        file: &File,
        ignore_existing: bool,
    ) -> Result<FileOutcome, MaterializeError> {
        let is_dir = self
            .fs
            .is_dir(destination)
            .await
            .map_err(|source| MaterializeError::Exists {
                path: destination.to_path_buf(),
                source,
            })?;
        if !is_dir {
            return Err(MaterializeError::PreconditionFailure {
                path: destination.to_path_buf(),
                name: file.name.clone(),
            });
        }

        let file_name = file.local_name();
        let file_path = destination.join(&file_name);

        if self.file_filters.iter().any(|re| re.is_match(&file_name)) {
            debug!("Filtered {}", file_path.display());
            return Ok(FileOutcome::Filtered(file_path));
        }

        let existed = self.exists(&file_path).await?;
        if existed && ignore_existing {
            info!("Ignore existing file {}", file_path.display());
            return Ok(FileOutcome::Existing(file_path));
        }

        let document_id = file
            .id
            .as_deref()
            .ok_or_else(|| MaterializeError::MissingDocumentId(file.name.clone()))?;
        let contents = self
            .downloader
            .download(context, document_id)
            .await
            .map_err(|source| MaterializeError::Download {
                name: file.name.clone(),
                source,
            })?;
        self.fs
            .write_file(&file_path, &contents)
            .await
            .map_err(|source| MaterializeError::Write {
                path: file_path.clone(),
                source,
            })?;
        debug!("Document saved to {}", file_path.display());

        Ok(if existed {
            FileOutcome::Replaced(file_path)
        } else {
            FileOutcome::New(file_path)
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool, MaterializeError> {
        self.fs
            .exists(path)
            .await
            .map_err(|source| MaterializeError::Exists {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn register(&self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::New(path) => {
                self.status_bar
                    .register_new(&path.to_string_lossy())
                    .await
            }
            FileOutcome::Replaced(path) => {
                self.status_bar
                    .register_updated(&path.to_string_lossy())
                    .await
            }
            FileOutcome::Existing(_) => self.status_bar.register_unchanged().await,
            FileOutcome::Filtered(_) => self.status_bar.register_skipped().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    use reqwest::cookie::Jar;
    use tempfile::tempdir;

    use super::*;
    use crate::status_bar::Totals;

    /// Returns `contents of <id>`, or an HTTP 500 for ids in `failing`
    #[derive(Default)]
    struct MockDownloader {
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockDownloader {
        fn failing(ids: &[&str]) -> Self {
            MockDownloader {
                failing: ids.iter().map(|id| id.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Downloader for MockDownloader {
        async fn download(
            &self,
            _context: &Context,
            document_id: &str,
        ) -> Result<Vec<u8>, DownloadError> {
            self.calls.lock().unwrap().push(document_id.to_string());
            if self.failing.contains(document_id) {
                return Err(DownloadError::Http {
                    status: 500,
                    document_id: document_id.to_string(),
                });
            }
            Ok(format!("contents of {}", document_id).into_bytes())
        }
    }

    /// Local disk, but remembers the order of created directories and written files
    #[derive(Default)]
    struct RecordingFs {
        events: Mutex<Vec<String>>,
    }

    impl Filesystem for RecordingFs {
        async fn exists(&self, path: &Path) -> io::Result<bool> {
            LocalFs.exists(path).await
        }

        async fn is_dir(&self, path: &Path) -> io::Result<bool> {
            LocalFs.is_dir(path).await
        }

        async fn make_dirs(&self, path: &Path) -> io::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("dir {}", path.display()));
            LocalFs.make_dirs(path).await
        }

        async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("file {}", path.display()));
            LocalFs.write_file(path, contents).await
        }
    }

    fn context() -> Context {
        Context::new("token", Arc::new(Jar::default()))
    }

    fn file(name: &str, id: &str) -> Node {
        Node::File(File {
            id: Some(id.to_string()),
            name: name.to_string(),
            extension: Some("pdf".to_string()),
            ..Default::default()
        })
    }

    fn folder(name: &str, children: Vec<Node>) -> Node {
        Node::Folder(Folder {
            name: name.to_string(),
            children,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_mirror_order() {
        let dir = tempdir().unwrap();
        let out = dir.path();
        let forest = vec![folder(
            "A",
            vec![file("f1", "1"), folder("B", vec![file("f2", "2")])],
        )];

        let downloader = MockDownloader::default();
        let fs = RecordingFs::default();
        let status_bar = StatusBar::default();
        Materializer::new(&downloader, &fs, &status_bar)
            .materialize(&context(), out, &forest, false)
            .await;

        assert_eq!(
            *fs.events.lock().unwrap(),
            vec![
                format!("dir {}", out.join("A").display()),
                format!("file {}", out.join("A/f1.pdf").display()),
                format!("dir {}", out.join("A/B").display()),
                format!("file {}", out.join("A/B/f2.pdf").display()),
            ]
        );
        assert_eq!(
            std::fs::read_to_string(out.join("A/B/f2.pdf")).unwrap(),
            "contents of 2"
        );
        assert_eq!(downloader.calls(), vec!["1", "2"]);
        assert_eq!(status_bar.totals().await.new, 2);
    }

    #[tokio::test]
    async fn test_ignore_existing_skips_download() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.pdf"), "old").unwrap();
        let Node::File(existing) = file("f", "1") else {
            unreachable!()
        };

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        let materializer = Materializer::new(&downloader, &LocalFs, &status_bar);
        let outcome = materializer
            .materialize_file(&context(), dir.path(), &existing, true)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Existing(dir.path().join("f.pdf")));
        assert!(downloader.calls().is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("f.pdf")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_existing_file_is_replaced() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.pdf"), "old").unwrap();

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        Materializer::new(&downloader, &LocalFs, &status_bar)
            .materialize(&context(), dir.path(), &[file("f", "1")], false)
            .await;

        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.pdf")).unwrap(),
            "contents of 1"
        );
        assert_eq!(status_bar.totals().await.updated, 1);
        assert!(!dir.path().join("f.pdf.tmp_edoc-dl").exists());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = tempdir().unwrap();
        let out = dir.path();
        let forest = vec![
            folder("B", vec![file("x", "bad"), file("y", "good")]),
            folder("C", vec![file("z", "other")]),
        ];

        let downloader = MockDownloader::failing(&["bad"]);
        let status_bar = StatusBar::default();
        Materializer::new(&downloader, &LocalFs, &status_bar)
            .materialize(&context(), out, &forest, false)
            .await;

        assert_eq!(downloader.calls(), vec!["bad", "good", "other"]);
        assert!(!out.join("B/x.pdf").exists());
        assert!(out.join("B/y.pdf").exists());
        assert!(out.join("C/z.pdf").exists());
        assert_eq!(
            status_bar.totals().await,
            Totals {
                new: 2,
                err: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_destination_is_a_precondition_failure() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("not-created");
        let Node::File(orphan) = file("f", "1") else {
            unreachable!()
        };

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        let err = Materializer::new(&downloader, &LocalFs, &status_bar)
            .materialize_file(&context(), &missing, &orphan, false)
            .await
            .unwrap_err();

        assert!(matches!(err, MaterializeError::PreconditionFailure { .. }));
        assert!(downloader.calls().is_empty());
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_regular_file_as_destination_is_a_precondition_failure() {
        let dir = tempdir().unwrap();
        let not_a_dir = dir.path().join("plain");
        std::fs::write(&not_a_dir, "occupied").unwrap();
        let Node::File(orphan) = file("f", "1") else {
            unreachable!()
        };

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        let err = Materializer::new(&downloader, &LocalFs, &status_bar)
            .materialize_file(&context(), &not_a_dir, &orphan, false)
            .await
            .unwrap_err();

        assert!(matches!(err, MaterializeError::PreconditionFailure { .. }));
        assert!(downloader.calls().is_empty());
        assert_eq!(std::fs::read_to_string(&not_a_dir).unwrap(), "occupied");
    }

    #[tokio::test]
    async fn test_folder_creation_failure_skips_only_that_subtree() {
        let dir = tempdir().unwrap();
        let out = dir.path();
        // A regular file where the folder should go
        std::fs::write(out.join("Blocked"), "not a directory").unwrap();
        let forest = vec![
            folder("Blocked", vec![file("lost", "1")]),
            folder("Open", vec![file("kept", "2")]),
        ];

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        Materializer::new(&downloader, &LocalFs, &status_bar)
            .materialize(&context(), out, &forest, false)
            .await;

        assert_eq!(downloader.calls(), vec!["2"]);
        assert!(out.join("Open/kept.pdf").exists());
        let totals = status_bar.totals().await;
        assert_eq!((totals.new, totals.err), (1, 1));
    }

    #[tokio::test]
    async fn test_missing_id_and_filters() {
        let dir = tempdir().unwrap();
        let forest = vec![
            Node::File(File {
                name: "no id".to_string(),
                ..Default::default()
            }),
            file("Payslip January", "1"),
            file("Newsletter", "2"),
        ];
        let filters = vec![Regex::new("^Newsletter").unwrap()];

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        Materializer::new(&downloader, &LocalFs, &status_bar)
            .with_file_filters(&filters)
            .materialize(&context(), dir.path(), &forest, false)
            .await;

        assert_eq!(downloader.calls(), vec!["1"]);
        assert!(dir.path().join("Payslip_January.pdf").exists());
        assert_eq!(
            status_bar.totals().await,
            Totals {
                skipped: 1,
                new: 1,
                err: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_existing_folders_are_reused() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("A")).unwrap();
        std::fs::write(dir.path().join("A/keep.txt"), "mine").unwrap();

        let downloader = MockDownloader::default();
        let status_bar = StatusBar::default();
        Materializer::new(&downloader, &LocalFs, &status_bar)
            .materialize(
                &context(),
                dir.path(),
                &[folder("A", vec![file("f", "1")])],
                false,
            )
            .await;

        assert_eq!(std::fs::read_to_string(dir.path().join("A/keep.txt")).unwrap(), "mine");
        assert!(dir.path().join("A/f.pdf").exists());
        assert_eq!(status_bar.totals().await.err, 0);
    }
}
