//! Live reload messages and the hub that fans them out to browsers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// WebSocket endpoint browsers connect to.
pub const WS_PATH: &str = "/__gantry/ws";

/// Path the client script is served from.
pub const CLIENT_PATH: &str = "/__gantry/client.js";

/// How a changed output file can be applied in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Style,
    Image,
    Script,
}

impl AssetKind {
    /// Classify an output file by extension.
    ///
    /// `None` means the page has to be reloaded (HTML, fonts, icons and
    /// anything unrecognized).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "css" => Some(AssetKind::Style),
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" => Some(AssetKind::Image),
            "js" | "mjs" => Some(AssetKind::Script),
            _ => None,
        }
    }
}

/// An output file that changed, addressed by its URL path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedAsset {
    pub path: String,
    pub kind: AssetKind,
}

/// Messages sent to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Swap the listed assets without reloading
    Inject { assets: Vec<ChangedAsset> },
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Send a message to every connected client.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open.
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Browser side of live reload.
///
/// Stylesheets and images are swapped by cache-busting their URLs; scripts
/// and everything else reload the page. The socket reconnects with backoff
/// when the server restarts.
pub fn client_script() -> String {
    format!(
        r#"(function() {{
  'use strict';

  var url = (location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{ws}';
  var attempts = 0;

  function pathOf(href) {{
    try {{
      return new URL(href, location.href).pathname;
    }} catch (e) {{
      return href;
    }}
  }}

  function bust(href) {{
    var u = new URL(href, location.href);
    u.searchParams.set('__gantry', Date.now());
    return u.toString();
  }}

  function swap(selector, attr, path) {{
    var found = false;
    document.querySelectorAll(selector).forEach(function(el) {{
      var value = el.getAttribute(attr);
      if (value && pathOf(value) === path) {{
        el.setAttribute(attr, bust(value));
        found = true;
      }}
    }});
    return found;
  }}

  function inject(assets) {{
    for (var i = 0; i < assets.length; i++) {{
      var asset = assets[i];
      if (asset.kind === 'style') {{
        swap('link[rel="stylesheet"]', 'href', asset.path);
      }} else if (asset.kind === 'image') {{
        swap('img', 'src', asset.path);
      }} else {{
        location.reload();
        return;
      }}
    }}
  }}

  function connect() {{
    var ws = new WebSocket(url);

    ws.onopen = function() {{
      attempts = 0;
    }};

    ws.onmessage = function(event) {{
      var msg = JSON.parse(event.data);
      switch (msg.type) {{
        case 'connected':
          console.log('[gantry] live reload connected');
          break;
        case 'reload':
          location.reload();
          break;
        case 'inject':
          inject(msg.assets);
          break;
      }}
    }};

    ws.onclose = function() {{
      if (attempts < 10) {{
        attempts++;
        setTimeout(connect, 500 * attempts);
      }}
    }};
  }}

  connect();
}})();
"#,
        ws = WS_PATH
    )
}
