// Line-oriented list files
// Callers must hold the queue lock; nothing here synchronizes on its own.

use filejob_core::domain::{DomainError, Job, QueueList};
use filejob_core::error::Result;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

/// First job line of a list, reading at most `limit` bytes per line
///
/// Blank lines are skipped. Lines must be UTF-8, as in `read_jobs`.
///
/// # Errors
/// - `DomainError::LineTooLong` if the first non-blank line exceeds `limit`
/// - `AppError::Io` (`InvalidData`) if a line is not UTF-8
pub async fn read_first_job(path: &Path, list: QueueList, limit: usize) -> Result<Option<Job>> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = BufReader::new(file);

    loop {
        let mut buf = Vec::new();
        let read = (&mut reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if buf.len() > limit && buf.last() != Some(&b'\n') {
            return Err(DomainError::LineTooLong { list, limit }.into());
        }
        let line = String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(job) = Job::from_line(&line) {
            return Ok(Some(job));
        }
    }
}

/// All job lines of a list, in file order
pub async fn read_jobs(path: &Path) -> Result<Vec<Job>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content.lines().filter_map(Job::from_line).collect())
}

/// Replace the contents of a list
///
/// Writes a sibling temporary file and renames it over the list, so readers see
/// either the old or the new contents, never a truncated file.
pub async fn rewrite_jobs(path: &Path, jobs: &[Job]) -> Result<()> {
    let tmp = temp_path(path);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(render(jobs).as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Append jobs to the end of a list
pub async fn append_jobs(path: &Path, jobs: &[Job]) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(render(jobs).as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}

fn render(jobs: &[Job]) -> String {
    jobs.iter().map(|job| format!("{}\n", job)).collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(command: &str) -> Job {
        Job::new(command).unwrap()
    }

    #[tokio::test]
    async fn test_read_first_job_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, "\n   \necho a\necho b\n").unwrap();

        let first = read_first_job(&path, QueueList::Pending, 4096).await.unwrap();

        assert_eq!(first, Some(job("echo a")));
    }

    #[tokio::test]
    async fn test_read_first_job_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, "").unwrap();

        assert_eq!(
            read_first_job(&path, QueueList::Pending, 4096).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_read_first_job_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, "echo last").unwrap();

        assert_eq!(
            read_first_job(&path, QueueList::Pending, 4096).await.unwrap(),
            Some(job("echo last"))
        );
    }

    #[tokio::test]
    async fn test_read_first_job_rejects_oversized_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, format!("echo {}\n", "x".repeat(64))).unwrap();

        let err = read_first_job(&path, QueueList::Pending, 16)
            .await
            .unwrap_err();

        assert!(err.is_integrity_violation());
    }

    #[tokio::test]
    async fn test_line_of_exactly_limit_bytes_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        let command = "x".repeat(16);
        std::fs::write(&path, format!("{}\n", command)).unwrap();

        assert_eq!(
            read_first_job(&path, QueueList::Pending, 16).await.unwrap(),
            Some(job(&command))
        );
    }

    #[tokio::test]
    async fn test_rewrite_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doing.txt");
        std::fs::write(&path, "old\n").unwrap();

        rewrite_jobs(&path, &[job("a"), job("b")]).await.unwrap();
        append_jobs(&path, &[job("c")]).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
        assert!(!dir.path().join("doing.txt.tmp").exists());
        assert_eq!(
            read_jobs(&path).await.unwrap(),
            vec![job("a"), job("b"), job("c")]
        );
    }

    #[tokio::test]
    async fn test_rewrite_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, "a\n").unwrap();

        rewrite_jobs(&path, &[]).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_non_utf8_is_rejected_by_both_readers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.txt");
        std::fs::write(&path, b"echo \xff\n").unwrap();

        let first = read_first_job(&path, QueueList::Pending, 4096).await;
        let all = read_jobs(&path).await;

        for err in [first.unwrap_err(), all.unwrap_err()] {
            match err {
                filejob_core::AppError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
                other => panic!("expected Io error, got {:?}", other),
            }
        }
    }
}
