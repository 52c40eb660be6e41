//! Username lookups: one HTTP probe per site profile URL.
use crate::probe::{Check, Observation, Probe};
use async_trait::async_trait;
use log::debug;
use reqwest::{redirect, Client, StatusCode};
use serde_derive::Deserialize;
use std::time::Duration;

/// A site to look the username up on. `{}` in the template is replaced by
/// the username.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Site {
    pub name: String,
    pub url_template: String,
}

impl Site {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
        }
    }

    pub fn url_for(&self, username: &str) -> String {
        self.url_template.replace("{}", username)
    }
}

const DEFAULT_SITES: [(&str, &str); 7] = [
    ("GitHub", "https://github.com/{}"),
    ("Reddit", "https://www.reddit.com/user/{}"),
    ("Twitter", "https://twitter.com/{}"),
    ("Instagram", "https://www.instagram.com/{}/"),
    ("Pinterest", "https://www.pinterest.com/{}/"),
    ("HackerNews", "https://news.ycombinator.com/user?id={}"),
    ("Dev.to", "https://dev.to/{}"),
];

pub fn default_sites() -> Vec<Site> {
    DEFAULT_SITES
        .iter()
        .map(|(name, template)| Site::new(*name, *template))
        .collect()
}

/// HTTP client shared by every username probe of a run.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .redirect(redirect::Policy::limited(4))
        .timeout(timeout)
        .user_agent(concat!("fanprobe/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Looks for a profile of the target username on one site.
#[derive(Debug, Clone)]
pub struct UsernameProbe {
    site: Site,
    client: Client,
}

impl UsernameProbe {
    pub fn new(site: Site, client: Client) -> Self {
        Self { site, client }
    }
}

#[async_trait]
impl Check for UsernameProbe {
    async fn check(&self, target: &str, timeout: Duration) -> anyhow::Result<Observation> {
        let url = self.site.url_for(target);
        let response = self.client.get(&url).timeout(timeout).send().await?;
        let status = response.status();
        debug!("{} answered {status} for {url}", self.site.name);

        if status == StatusCode::OK {
            Ok(Observation::hit(url))
        } else {
            Ok(Observation::miss())
        }
    }
}

/// One probe per site, keyed by the site name.
pub fn username_probes(sites: &[Site], client: &Client) -> Vec<Probe> {
    sites
        .iter()
        .map(|site| {
            Probe::new(
                site.name.clone(),
                UsernameProbe::new(site.clone(), client.clone()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Answers 200 for `/alice` and 404 for anything else.
    async fn profile_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let status = if request.starts_with("GET /alice ") {
                        "200 OK"
                    } else {
                        "404 Not Found"
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{addr}/{{}}")
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn template_takes_the_username() {
        let site = Site::new("HackerNews", "https://news.ycombinator.com/user?id={}");
        assert_eq!(
            site.url_for("pg"),
            "https://news.ycombinator.com/user?id=pg"
        );
    }

    #[test]
    fn default_table_is_keyed_by_site() {
        let probes = username_probes(&default_sites(), &client());
        assert_eq!(probes.len(), 7);
        assert_eq!(probes[0].key(), "GitHub");
        assert_eq!(probes[6].key(), "Dev.to");
    }

    #[tokio::test]
    async fn existing_profile_is_a_hit() {
        let template = profile_server().await;
        let probe = UsernameProbe::new(Site::new("local", template.clone()), client());

        let seen = probe.check("alice", Duration::from_secs(2)).await.unwrap();

        assert!(seen.success);
        assert_eq!(seen.payload, Some(template.replace("{}", "alice")));
    }

    #[tokio::test]
    async fn missing_profile_is_a_miss() {
        let template = profile_server().await;
        let probe = UsernameProbe::new(Site::new("local", template), client());

        let seen = probe.check("bob", Duration::from_secs(2)).await.unwrap();

        assert_eq!(seen, Observation::miss());
    }
}
