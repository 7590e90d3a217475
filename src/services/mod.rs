pub mod api_client;
pub mod branding;
pub mod client_settings;
pub mod downloader;
pub mod installer;
pub mod mirror_selector;
pub mod process_supervisor;
pub mod url_handler;

pub use api_client::ApiClient;
pub use branding::IconBrander;
pub use client_settings::{ClientSettingsService, Overrides};
pub use downloader::{DownloadControl, Downloader, ProgressSink};
pub use installer::Installer;
pub use mirror_selector::MirrorSelector;
pub use process_supervisor::{LaunchedProcess, ProcessSupervisor};
pub use url_handler::{LaunchArguments, LaunchRequestReceiver, LaunchRequestSlot};
