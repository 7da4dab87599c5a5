use rocky_core::{BrowserConf, RendererConf};

/// Sandbox-related flags for docker / lambda style environments.
pub const CONTAINER_FLAGS: [&str; 4] = [
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--single-process",
    "--no-zygote",
];

/// Extra command line flags for the browser process. Headless mode, window
/// size, executable and sandbox are set on the launch builder directly.
pub fn browser_flags(browser: &BrowserConf, renderer: &RendererConf) -> Vec<String> {
    let mut flags = vec![format!("--blink-settings=imagesEnabled={}", renderer.image_load)];
    if let Some(user_agent) = &renderer.user_agent {
        flags.push(format!("--user-agent={}", user_agent));
    }
    if browser.container {
        flags.extend(CONTAINER_FLAGS.iter().map(|f| f.to_string()));
    }
    flags
}
