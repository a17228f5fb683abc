//! Plain browser adapter.

use miniapp_host::{
    default_download_file, AdapterCore, AdapterDeps, AdapterError, AdapterFuture,
    DownloadOptions, EnvironmentInfo, HomeScreenStatus, MiniAppAdapter, Platform,
    PlatformCapabilities, QrScanOptions,
};

/// Adapter used outside any messenger host.
pub struct WebAdapter {
    core: AdapterCore,
}

impl WebAdapter {
    /// Adapter whose environment reflects the browser's user agent and language.
    pub fn new(deps: AdapterDeps) -> Self {
        let mut environment = EnvironmentInfo::new(Platform::Web);
        environment.sdk_version = Some(deps.browser.user_agent()).filter(|ua| !ua.is_empty());
        environment.language_code = deps.browser.language();
        environment.is_web_view = Some(false);
        Self {
            core: AdapterCore::new(environment, PlatformCapabilities::none(), deps),
        }
    }

    fn download_options(&self, prefer_blob: bool) -> DownloadOptions {
        DownloadOptions {
            prefer_blob,
            revoke_after_ms: self.core.config().blob_url_revoke_ms,
        }
    }
}

impl MiniAppAdapter for WebAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn download_file<'a>(
        &'a self,
        url: &'a str,
        file_name: Option<&'a str>,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let blob_first =
                default_download_file(&self.core, url, file_name, self.download_options(true))
                    .await;
            match blob_first {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::warn!("[miniapp-host] Web downloadFile fallback: {err}");
                    default_download_file(&self.core, url, file_name, self.download_options(false))
                        .await
                }
            }
        })
    }

    fn scan_qr_code(&self, _options: QrScanOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            match self.core.browser().scan_qr().await {
                Ok(value) => value,
                Err(err) => {
                    tracing::error!("[miniapp-host] QR scanner failed to start: {err}");
                    None
                }
            }
        })
    }

    fn add_to_home_screen(&self) -> AdapterFuture<'_, bool> {
        Box::pin(async move {
            let browser = self.core.browser();
            if !browser.user_agent().to_lowercase().contains("android") {
                return false;
            }
            let Some(prompt) = browser.install_prompt() else {
                return false;
            };
            match prompt.await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!("[miniapp-host] Web addToHomeScreen failed: {err}");
                    false
                }
            }
        })
    }

    fn check_home_screen_status(&self) -> AdapterFuture<'_, HomeScreenStatus> {
        Box::pin(async move {
            if self.core.browser().is_standalone() {
                HomeScreenStatus::Added
            } else {
                HomeScreenStatus::Unknown
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::executor::block_on;
    use miniapp_host::{AdapterConfig, ManualScheduler, MemoryBrowserHost};
    use pretty_assertions::assert_eq;

    use super::*;

    fn adapter(browser: &MemoryBrowserHost, scheduler: &ManualScheduler) -> WebAdapter {
        WebAdapter::new(AdapterDeps::new(
            Rc::new(browser.clone()),
            Rc::new(scheduler.clone()),
            AdapterConfig::default(),
        ))
    }

    #[test]
    fn environment_comes_from_navigator() {
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| state.language = Some("fr-FR".to_string()));
        let adapter = adapter(&browser, &ManualScheduler::new());

        let environment = adapter.environment();

        assert_eq!(environment.platform, Platform::Web);
        assert_eq!(environment.sdk_version.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(environment.language_code.as_deref(), Some("fr-FR"));
        assert_eq!(environment.is_web_view, Some(false));
    }

    #[test]
    fn downloads_prefer_blob_and_revoke_later() {
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| state.blob_url = Some("blob:https://app/1".to_string()));
        let scheduler = ManualScheduler::new();
        let adapter = adapter(&browser, &scheduler);

        block_on(adapter.download_file("https://cdn.example.com/a.csv", None)).expect("download");
        scheduler.advance(30_000);

        let state = browser.state();
        assert_eq!(
            state.downloads,
            vec![("blob:https://app/1".to_string(), "a.csv".to_string(), false)]
        );
        assert_eq!(state.revoked_urls, vec!["blob:https://app/1".to_string()]);
    }

    #[test]
    fn failed_blob_fetch_opens_direct_link() {
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&browser, &ManualScheduler::new());

        block_on(adapter.download_file("https://cdn.example.com/a.csv", Some("report.csv")))
            .expect("download");

        assert_eq!(
            browser.state().downloads,
            vec![(
                "https://cdn.example.com/a.csv".to_string(),
                "report.csv".to_string(),
                true
            )]
        );
    }

    #[test]
    fn install_prompt_only_on_android() {
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| state.install_prompt_accepted = Some(true));
        let adapter = adapter(&browser, &ManualScheduler::new());

        assert!(!block_on(adapter.add_to_home_screen()));

        browser.configure(|state| {
            state.user_agent = "Mozilla/5.0 (Linux; Android 14)".to_string();
        });
        assert!(block_on(adapter.add_to_home_screen()));
        assert!(!block_on(adapter.add_to_home_screen()));
    }

    #[test]
    fn standalone_display_counts_as_added() {
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&browser, &ManualScheduler::new());
        assert_eq!(
            block_on(adapter.check_home_screen_status()),
            HomeScreenStatus::Unknown
        );

        browser.configure(|state| state.standalone = true);

        assert_eq!(
            block_on(adapter.check_home_screen_status()),
            HomeScreenStatus::Added
        );
    }

    #[test]
    fn camera_scan_result_is_returned() {
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| state.scanned_qr = Some("WIFI:S:cafe;;".to_string()));
        let adapter = adapter(&browser, &ManualScheduler::new());

        assert_eq!(
            block_on(adapter.scan_qr_code(QrScanOptions::default())).as_deref(),
            Some("WIFI:S:cafe;;")
        );
    }
}
