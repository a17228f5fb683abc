//! File download through the browser, with optional blob prefetch.

use std::rc::Rc;

use crate::{browser::BrowserHost, scheduler::Scheduler};

/// Picks the download file name.
///
/// A non-blank `provided` name wins; otherwise the last path segment of an absolute URL is used,
/// and `download` when neither yields anything.
pub fn fallback_file_name(url: &str, provided: Option<&str>) -> String {
    if let Some(name) = provided.filter(|name| !name.trim().is_empty()) {
        return name.to_string();
    }
    last_path_segment(url).unwrap_or_else(|| "download".to_string())
}

fn last_path_segment(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "+-.".contains(ch))
    {
        return None;
    }
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let path = rest.find('/').map_or("", |index| &rest[index..]);
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Options for [`trigger_file_download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Fetch the body first and download it from an object URL.
    pub prefer_blob: bool,
    /// Delay before the object URL is revoked.
    pub revoke_after_ms: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            prefer_blob: false,
            revoke_after_ms: crate::config::DEFAULT_BLOB_URL_REVOKE_MS,
        }
    }
}

/// Downloads `url` through the browser.
///
/// With `prefer_blob` the body is fetched and saved from an object URL that is revoked after
/// `revoke_after_ms`; a failed fetch falls back to a direct link opened in a new tab. Empty URLs
/// are ignored, and without a document the URL is opened in a new window.
pub async fn trigger_file_download(
    host: &Rc<dyn BrowserHost>,
    scheduler: &dyn Scheduler,
    url: &str,
    file_name: Option<&str>,
    options: DownloadOptions,
) -> Result<(), String> {
    if url.is_empty() {
        return Ok(());
    }
    let file_name = fallback_file_name(url, file_name);

    if !host.is_available() {
        return host.open_window(url);
    }

    if options.prefer_blob {
        match host.fetch_blob_url(url).await {
            Ok(object_url) => {
                host.anchor_download(&object_url, &file_name, false)?;
                let revoke_host = host.clone();
                scheduler.set_timeout(
                    options.revoke_after_ms,
                    Box::new(move || revoke_host.revoke_object_url(&object_url)),
                );
                return Ok(());
            }
            Err(err) => {
                tracing::warn!(
                    "[miniapp-host] blob download failed, falling back to direct link: {err}"
                );
            }
        }
    }

    host.anchor_download(url, &file_name, true)
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{browser::MemoryBrowserHost, scheduler::ManualScheduler};

    #[test]
    fn file_name_prefers_provided_then_path_then_generic() {
        assert_eq!(
            fallback_file_name("https://cdn.example.com/files/report.pdf?v=2", Some("q3.pdf")),
            "q3.pdf"
        );
        assert_eq!(
            fallback_file_name("https://cdn.example.com/files/report.pdf?v=2", Some("  ")),
            "report.pdf"
        );
        assert_eq!(
            fallback_file_name("https://cdn.example.com/files/", None),
            "files"
        );
        assert_eq!(fallback_file_name("https://cdn.example.com", None), "download");
        assert_eq!(fallback_file_name("/relative/report.pdf", None), "download");
    }

    #[test]
    fn blob_download_revokes_object_url_later() {
        let memory = MemoryBrowserHost::new();
        memory.configure(|state| state.blob_url = Some("blob:1".to_string()));
        let host: Rc<dyn BrowserHost> = Rc::new(memory.clone());
        let scheduler = ManualScheduler::new();

        let options = DownloadOptions {
            prefer_blob: true,
            revoke_after_ms: 30_000,
        };
        block_on(trigger_file_download(
            &host,
            &scheduler,
            "https://example.com/a/card.pkpass",
            None,
            options,
        ))
        .expect("download");

        assert_eq!(
            memory.state().downloads,
            vec![("blob:1".to_string(), "card.pkpass".to_string(), false)]
        );
        assert!(memory.state().revoked_urls.is_empty());
        scheduler.advance(30_000);
        assert_eq!(memory.state().revoked_urls, vec!["blob:1".to_string()]);
    }

    #[test]
    fn failed_blob_fetch_falls_back_to_direct_link() {
        let memory = MemoryBrowserHost::new();
        let host: Rc<dyn BrowserHost> = Rc::new(memory.clone());

        block_on(trigger_file_download(
            &host,
            &ManualScheduler::new(),
            "https://example.com/a/card.pkpass",
            Some("card.pkpass"),
            DownloadOptions {
                prefer_blob: true,
                ..DownloadOptions::default()
            },
        ))
        .expect("download");

        assert_eq!(
            memory.state().downloads,
            vec![(
                "https://example.com/a/card.pkpass".to_string(),
                "card.pkpass".to_string(),
                true
            )]
        );
    }
}
