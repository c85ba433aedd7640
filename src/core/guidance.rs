//! Remediation text keyed by failure kind

use crate::core::classifier::ErrorKind;
use crate::core::config::{ENV_COOKIES_BROWSER, ENV_COOKIES_FILE, ENV_COOKIES_PROFILE};

/// How to configure credentials when none are set up
pub fn auth_setup_help() -> String {
    format!(
        "Authentication required
-----------------------
The site wants a signed-in session for this video (for example \"Sign in to
confirm you're not a bot\"). Configure ONE credential source, in the
environment or in a .env file next to where you run mediafetch:

1) Cookies read from your browser (recommended)
     {ENV_COOKIES_BROWSER}=chrome      # brave | chrome | chromium | edge | firefox | opera | safari | vivaldi | whale
     {ENV_COOKIES_PROFILE}=Default     # optional, e.g. \"Profile 1\"

2) An exported cookies.txt
     Export cookies for the site while signed in (a \"cookies.txt\" browser
     extension works), save the file, then set:
     {ENV_COOKIES_FILE}=~/cookies.txt

The same settings are available as --cookies-from-browser, --browser-profile
and --cookies. API keys cannot authenticate downloads; only a browser session can.
Run mediafetch again once a source is configured."
    )
}

/// Targeted advice for a failed authenticated attempt
pub fn remediation(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::CredentialStoreLocked => format!(
            "The browser cookie database is locked or could not be copied.
Fix suggestions:
 - Quit the browser completely, including background processes.
   Chromium-based browsers: Settings > System > turn off \"Continue running
   background apps when the browser is closed\".
 - Make sure no chrome/brave/msedge process is still running.
 - Or export cookies to a cookies.txt file and set {ENV_COOKIES_FILE}.
   See https://github.com/yt-dlp/yt-dlp/issues/7271"
        ),
        ErrorKind::CredentialDecryptionFailed => format!(
            "The browser cookies could not be decrypted by the operating system.
Fix suggestions:
 - Run mediafetch as the same user that runs the browser.
 - Try an elevated or non-elevated shell, whichever you did not use.
 - Check the profile name ({ENV_COOKIES_PROFILE}, e.g. Default vs \"Profile 1\").
 - Or export cookies to a cookies.txt file and set {ENV_COOKIES_FILE}.
   See https://github.com/yt-dlp/yt-dlp/issues/10927"
        ),
        ErrorKind::AuthRequired => format!(
            "The site still asks for sign-in, so the configured cookies were rejected.
Sign in again in the browser, re-export or re-select the cookies, and retry.

{}",
            auth_setup_help()
        ),
        ErrorKind::Transient => {
            "The connection kept failing. Check the network and try again later.".to_string()
        }
        ErrorKind::Fatal => {
            "The download failed for a reason credentials cannot fix. See the engine message above."
                .to_string()
        }
    }
}
