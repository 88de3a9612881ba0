#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Public base URL used when rendering full short links, e.g.
    /// `https://s.example.com`.
    pub base_url: String,
    /// VAPID EC private key in PEM form. Push delivery is disabled when
    /// absent.
    pub vapid_private_key: Option<String>,
    /// base64url-encoded VAPID public key, handed to browsers as the
    /// `applicationServerKey` and sent in the `Crypto-Key` header.
    pub vapid_public_key: Option<String>,
    /// `mailto:` or URL contact claim for VAPID tokens.
    pub vapid_subject: String,
}

impl Config {
    pub fn new(
        database_url: String,
        base_url: String,
        vapid_private_key: Option<String>,
        vapid_public_key: Option<String>,
        vapid_subject: String,
    ) -> Config {
        Config {
            database_url,
            base_url,
            vapid_private_key,
            vapid_public_key,
            vapid_subject,
        }
    }
}
