//! Resource loading for `fetch()` and the responses it produces.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::FetchError;

/// Where module `fetch` calls are served from.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Serves URLs as paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a URL to a file under the root, refusing anything that would
    /// climb out of it.
    pub fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        let path = url
            .strip_prefix("file://")
            .unwrap_or(url)
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(FetchError::Forbidden(url.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

impl Fetch for DirFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(url)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(url.to_string()),
            _ => FetchError::Io {
                url: url.to_string(),
                reason: e.to_string(),
            },
        })
    }
}

/// In-memory resources keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.insert(url.into(), body.into().into());
        self
    }
}

impl Fetch for MapFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.entries
            .get(url)
            .map(|body| body.to_vec())
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseId(u32);

#[derive(Debug)]
pub struct Response {
    pub url: String,
    pub status: u16,
    body: Option<Arc<[u8]>>,
}

impl Response {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_used(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Default)]
pub struct Responses {
    entries: Vec<Option<Response>>,
    free: Vec<u32>,
}

impl Responses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns a fetch outcome into a response. Missing resources become a
    /// 404; any other failure is a network error and yields `Err`.
    pub fn complete(
        &mut self,
        url: &str,
        result: Result<Vec<u8>, FetchError>,
    ) -> Result<ResponseId, FetchError> {
        let (status, body) = match result {
            Ok(body) => (200, body),
            Err(FetchError::NotFound(_)) => (404, Vec::new()),
            Err(other) => return Err(other),
        };
        let response = Response {
            url: url.to_string(),
            status,
            body: Some(body.into()),
        };
        let id = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = Some(response);
                index
            }
            None => {
                self.entries.push(Some(response));
                self.entries.len() as u32 - 1
            }
        };
        Ok(ResponseId(id))
    }

    pub fn get(&self, id: ResponseId) -> Option<&Response> {
        self.entries.get(id.0 as usize)?.as_ref()
    }

    /// Takes the body; `None` once it has been read.
    pub fn take_body(&mut self, id: ResponseId) -> Option<Arc<[u8]>> {
        self.entries.get_mut(id.0 as usize)?.as_mut()?.body.take()
    }

    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every response not in `live`, body included. Returns how many
    /// were dropped.
    pub fn retain(&mut self, live: &HashSet<ResponseId>) -> usize {
        let mut dropped = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.is_some() && !live.contains(&ResponseId(index as u32)) {
                *entry = None;
                self.free.push(index as u32);
                dropped += 1;
            }
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/mesh.bin"), [1u8, 2, 3]).unwrap();
        let fetcher = DirFetcher::new(dir.path());

        assert_eq!(fetcher.fetch("assets/mesh.bin").unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.fetch("/assets/mesh.bin?v=2").unwrap(), vec![1, 2, 3]);
        assert_eq!(
            fetcher.fetch("assets/missing.bin"),
            Err(FetchError::NotFound("assets/missing.bin".into()))
        );
        assert!(matches!(
            fetcher.fetch("../secret"),
            Err(FetchError::Forbidden(_))
        ));
    }

    #[test]
    fn test_map_fetcher() {
        let mut fetcher = MapFetcher::new();
        fetcher.insert("a.txt", b"hello".to_vec());
        assert_eq!(fetcher.fetch("a.txt").unwrap(), b"hello");
        assert!(fetcher.fetch("b.txt").is_err());
    }

    #[test]
    fn test_responses() {
        let mut responses = Responses::new();
        let ok = responses.complete("a", Ok(vec![9])).unwrap();
        let missing = responses
            .complete("b", Err(FetchError::NotFound("b".into())))
            .unwrap();
        assert!(responses
            .complete(
                "c",
                Err(FetchError::Io {
                    url: "c".into(),
                    reason: "denied".into()
                })
            )
            .is_err());

        assert!(responses.get(ok).unwrap().ok());
        assert_eq!(responses.get(missing).unwrap().status, 404);
        assert!(!responses.get(missing).unwrap().ok());

        assert_eq!(responses.take_body(ok).as_deref(), Some(&[9u8][..]));
        assert!(responses.take_body(ok).is_none());
        assert!(responses.get(ok).unwrap().body_used());
    }

    #[test]
    fn test_retain_drops_unreferenced_responses() {
        let mut responses = Responses::new();
        let kept = responses.complete("a", Ok(vec![1])).unwrap();
        let gone = responses.complete("b", Ok(vec![2, 3])).unwrap();

        let live = HashSet::from([kept]);
        assert_eq!(responses.retain(&live), 1);
        assert_eq!(responses.len(), 1);
        assert!(responses.get(gone).is_none());
        assert!(responses.take_body(gone).is_none());
        assert_eq!(responses.get(kept).unwrap().url, "a");

        assert_eq!(responses.complete("c", Ok(Vec::new())).unwrap(), gone);
    }
}
