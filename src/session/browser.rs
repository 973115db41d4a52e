//! Drives a real browser through the login form to mint a fresh session
//! cookie. Grounded on
//! `original_source/app/services/session_refresh_service.py`'s Playwright
//! flow, reimplemented on `fantoccini` (the ecosystem's WebDriver client —
//! no Playwright-equivalent crate exists in the corpus) driving a
//! `chromedriver` subprocess over the W3C WebDriver wire protocol.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use fantoccini::{ClientBuilder, Locator};
use rand::Rng;
use tokio::process::{Child, Command};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::config::Settings;
use crate::crypto;
use crate::models::RefreshCredentialRow;

const LOGIN_URL: &str = "https://www.example-photo-network.com/accounts/login/";
const HOME_URL_FRAGMENT: &str = "example-photo-network.com/";
const TWO_FACTOR_URL_FRAGMENT: &str = "/accounts/login/two_factor";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(20);
const TWO_FACTOR_POLL_TIMEOUT: Duration = Duration::from_secs(5);

pub enum LoginOutcome {
    Success { cookie: String },
    LoginFailed { reason: String },
    TwoFactorRequired { reason: String },
}

/// Owns the chromedriver subprocess for exactly one login attempt.
/// Never reused across concurrent refreshes — `SessionManager::refresh_now`
/// already serializes refreshes via its single-flight lock, but this type
/// enforces the stronger guarantee that the driver process itself is
/// scoped to one call.
struct WebDriverGuard {
    child: Child,
    port: u16,
}

impl WebDriverGuard {
    async fn spawn() -> Result<Self, String> {
        let port = 9515 + (rand::thread_rng().gen_range(0..1000) as u16);
        let child = Command::new("chromedriver")
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn chromedriver: {e}"))?;

        // Give the driver a moment to bind its port before we connect.
        tokio::time::sleep(Duration::from_millis(500)).await;

        Ok(Self { child, port })
    }

    fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Drop for WebDriverGuard {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

async fn random_delay(min_ms: u64, max_ms: u64) {
    let millis = rand::thread_rng().gen_range(min_ms..=max_ms);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

/// JS overriding automation fingerprints, executed right after the login
/// page loads. Mirrors the original's stealth-script injection; the
/// WebDriver wire protocol has no pre-navigation script-injection hook,
/// so this runs as early as the protocol allows instead of before
/// navigation.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => false });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'platform', { get: () => 'Win32' });
"#;

pub async fn login_and_extract_cookie(
    settings: &Arc<Settings>,
    credential: &RefreshCredentialRow,
) -> Result<LoginOutcome, String> {
    let username = credential.username.clone();
    let password = crypto::decrypt(&credential.password_ciphertext, &settings.process_secret, settings.encryption_kdf_iterations)
        .map_err(|e| format!("failed to decrypt password: {e}"))?;
    let totp_secret = match &credential.totp_secret_ciphertext {
        Some(ct) => Some(
            crypto::decrypt(ct, &settings.process_secret, settings.encryption_kdf_iterations)
                .map_err(|e| format!("failed to decrypt TOTP secret: {e}"))?,
        ),
        None => None,
    };

    let driver = WebDriverGuard::spawn().await?;

    let mut caps = serde_json::map::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        serde_json::json!({
            "args": [
                "--disable-blink-features=AutomationControlled",
                "--disable-infobars",
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--window-size=1920,1080",
            ]
        }),
    );

    let client = ClientBuilder::native()
        .capabilities(caps)
        .connect(&driver.url())
        .await
        .map_err(|e| format!("failed to connect to webdriver: {e}"))?;

    let result = run_login_flow(&client, &username, &password, totp_secret.as_deref()).await;

    let _ = client.close().await;
    drop(driver);

    result
}

async fn run_login_flow(
    client: &fantoccini::Client,
    username: &str,
    password: &str,
    totp_secret: Option<&str>,
) -> Result<LoginOutcome, String> {
    client
        .goto(LOGIN_URL)
        .await
        .map_err(|e| format!("navigation failed: {e}"))?;

    let _ = client.execute(STEALTH_SCRIPT, vec![]).await;

    random_delay(300, 900).await;

    dismiss_if_present(client, "button[aria-label=\"Allow all cookies\"]").await;

    let username_field = client
        .find(Locator::Css("input[name=username]"))
        .await
        .map_err(|e| format!("login form not found: {e}"))?;
    username_field
        .send_keys(username)
        .await
        .map_err(|e| format!("failed to type username: {e}"))?;

    random_delay(200, 600).await;

    let password_field = client
        .find(Locator::Css("input[name=password]"))
        .await
        .map_err(|e| format!("password field not found: {e}"))?;
    password_field
        .send_keys(password)
        .await
        .map_err(|e| format!("failed to type password: {e}"))?;

    random_delay(200, 600).await;

    let submit = client
        .find(Locator::Css("button[type=submit]"))
        .await
        .map_err(|e| format!("submit button not found: {e}"))?;
    submit.click().await.map_err(|e| format!("submit click failed: {e}"))?;

    let deadline = tokio::time::Instant::now() + LOGIN_TIMEOUT;
    loop {
        let current_url = client.current_url().await.map_err(|e| e.to_string())?;
        let url_str = current_url.as_str();

        if url_str.contains(TWO_FACTOR_URL_FRAGMENT) {
            return handle_two_factor(client, totp_secret).await;
        }
        if url_str.contains(HOME_URL_FRAGMENT) && !url_str.contains("/accounts/login") {
            break;
        }
        if let Some(reason) = check_login_error(client).await {
            return Ok(LoginOutcome::LoginFailed { reason });
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(LoginOutcome::LoginFailed {
                reason: "timed out waiting for login redirect".to_string(),
            });
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    dismiss_if_present(client, "button:contains(\"Save Info\")").await;
    dismiss_if_present(client, "button[aria-label=\"Close\"]").await;

    extract_session_cookie(client).await
}

async fn handle_two_factor(
    client: &fantoccini::Client,
    totp_secret: Option<&str>,
) -> Result<LoginOutcome, String> {
    let Some(secret) = totp_secret else {
        return Ok(LoginOutcome::TwoFactorRequired {
            reason: "two-factor challenge reached with no shared secret stored".to_string(),
        });
    };

    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| format!("invalid TOTP secret: {e}"))?,
    )
    .map_err(|e| format!("failed to build TOTP: {e}"))?;

    let code = totp.generate_current().map_err(|e| format!("failed to generate TOTP code: {e}"))?;

    let code_field = client
        .find(Locator::Css("input[name=verificationCode]"))
        .await
        .map_err(|e| format!("2FA field not found: {e}"))?;
    code_field.send_keys(&code).await.map_err(|e| e.to_string())?;

    let confirm = client
        .find(Locator::Css("button[type=submit]"))
        .await
        .map_err(|e| format!("2FA submit not found: {e}"))?;
    confirm.click().await.map_err(|e| e.to_string())?;

    let deadline = tokio::time::Instant::now() + LOGIN_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        let url = client.current_url().await.map_err(|e| e.to_string())?;
        if url.as_str().contains(HOME_URL_FRAGMENT) && !url.as_str().contains("two_factor") {
            return extract_session_cookie(client).await;
        }
        tokio::time::sleep(TWO_FACTOR_POLL_TIMEOUT).await;
    }

    Ok(LoginOutcome::LoginFailed {
        reason: "timed out after submitting two-factor code".to_string(),
    })
}

async fn check_login_error(client: &fantoccini::Client) -> Option<String> {
    for selector in ["#slfErrorAlert", "[role=alert]", ".error-message"] {
        if let Ok(el) = client.find(Locator::Css(selector)).await {
            if let Ok(text) = el.text().await {
                if !text.trim().is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

async fn dismiss_if_present(client: &fantoccini::Client, selector: &str) {
    if let Ok(el) = client.find(Locator::Css(selector)).await {
        let _ = el.click().await;
    }
}

async fn extract_session_cookie(client: &fantoccini::Client) -> Result<LoginOutcome, String> {
    let cookies = client
        .get_all_cookies()
        .await
        .map_err(|e| format!("failed to read cookie jar: {e}"))?;

    match cookies.iter().find(|c| c.name() == "sessionid") {
        Some(cookie) => Ok(LoginOutcome::Success {
            cookie: cookie.value().to_string(),
        }),
        None => Ok(LoginOutcome::LoginFailed {
            reason: "no session cookie present after apparently successful login".to_string(),
        }),
    }
}
