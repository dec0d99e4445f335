//! End-to-end setup runs with the real cache, downloader and extractor.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use setup_tool_core::testing::{RecordingDiagnostics, write_tar_gz, write_zip};
use setup_tool_core::{
    ArchiveExtractor, AssetLocator, CacheStore, Collaborators, GitHubClient, HostArch,
    HostPlatform, HttpDownloader, MapInputs, PlatformContext, Result, RunnerFiles, SetupOutcome,
    ToolCache, ToolIdentity, run,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Env {
    temp: TempDir,
    server: MockServer,
    cache: ToolCache,
    diagnostics: RecordingDiagnostics,
}

impl Env {
    async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        Self {
            cache: ToolCache::new(temp.path().join("toolcache")),
            server: MockServer::start().await,
            diagnostics: RecordingDiagnostics::new(),
            temp,
        }
    }

    async fn serve_file(&self, route: &str, bytes: Vec<u8>, times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    async fn run(&self, ctx: PlatformContext, inputs: &MapInputs) -> Result<SetupOutcome> {
        let registry = GitHubClient::new()?.with_api_url(self.server.uri());
        let locator = AssetLocator::new(Arc::new(registry));
        let downloader = HttpDownloader::new()?;
        let runner_files = RunnerFiles::new(
            Some(self.temp.path().join("output")),
            Some(self.temp.path().join("path")),
        );
        let collaborators = Collaborators {
            cache: &self.cache,
            downloader: &downloader,
            extractor: &ArchiveExtractor,
            locator: &locator,
            diagnostics: &self.diagnostics,
            runner_files: &runner_files,
            temp_dir: self.temp.path().join("tmp"),
        };
        run(&ctx, inputs, &collaborators).await
    }

    fn archive(&self, name: &str) -> std::path::PathBuf {
        self.temp.path().join(name)
    }
}

fn linux_x64() -> PlatformContext {
    PlatformContext::new(HostPlatform::Linux, HostArch::X64)
}

#[tokio::test]
async fn test_tarball_install_and_cache_hit() {
    let env = Env::new().await;
    let archive = env.archive("litx.tar.gz");
    write_tar_gz(
        &archive,
        &[
            ("litx-0.0.0.2/litx", b"#!/bin/sh\necho litx\n"),
            ("litx-0.0.0.2/README.md", b"readme"),
        ],
    );
    env.serve_file(
        "/litx-0.0.0.2-linux-x64.tar.gz",
        std::fs::read(&archive).unwrap(),
        1,
    )
    .await;

    let inputs = MapInputs::new()
        .with("name", "litx")
        .with("version", "0.0.0.2")
        .with("url", format!("{}/{{name}}-{{version}}-{{os}}-{{arch}}.{{ext}}", env.server.uri()))
        .with("subdir", "{name}-{version}");

    let first = env.run(linux_x64(), &inputs).await.unwrap();
    let expected_dir = env.temp.path().join("toolcache/litx/0.0.0.2/x64");
    assert_eq!(first.dir, expected_dir);
    assert_eq!(
        std::fs::read_to_string(expected_dir.join("litx")).unwrap(),
        "#!/bin/sh\necho litx\n"
    );

    // Served once: the second run must not touch the network
    let second = env.run(linux_x64(), &inputs).await.unwrap();
    assert_eq!(second.dir, first.dir);

    let output = std::fs::read_to_string(env.temp.path().join("output")).unwrap();
    assert_eq!(
        output,
        format!(
            "directory={0}\ndirectory={0}\n",
            expected_dir.display()
        )
    );
    assert!(
        env.cache
            .find(&ToolIdentity::new("litx", "0.0.0.2", "x64"))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_win32_infers_zip() {
    let env = Env::new().await;
    let archive = env.archive("tool.zip");
    write_zip(&archive, &[("tool.exe", b"MZ")]);
    env.serve_file("/tool-win32.zip", std::fs::read(&archive).unwrap(), 1)
        .await;

    let inputs = MapInputs::new()
        .with("name", "tool")
        .with("version", "2.0")
        .with("url", "https://unused.example.com/tool.tar.gz")
        .with("url-win32", format!("{}/tool-{{os}}.{{ext}}", env.server.uri()));

    let ctx = PlatformContext::new(HostPlatform::Win32, HostArch::X64);
    let outcome = env.run(ctx, &inputs).await.unwrap();

    assert_eq!(std::fs::read(outcome.dir.join("tool.exe")).unwrap(), b"MZ");
}

#[tokio::test]
async fn test_no_extract_installs_named_executable() {
    let env = Env::new().await;
    env.serve_file("/jq-linux-amd64", b"\x7fELF".to_vec(), 1).await;

    let inputs = MapInputs::new()
        .with("name", "jq")
        .with("version", "1.7.1")
        .with("url", format!("{}/jq-linux-amd64", env.server.uri()))
        .with("no-extract", "true");

    let outcome = env.run(linux_x64(), &inputs).await.unwrap();
    let installed = outcome.dir.join("jq");
    assert_eq!(std::fs::read(&installed).unwrap(), b"\x7fELF");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&installed).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[tokio::test]
async fn test_private_asset_and_latest_version() {
    let env = Env::new().await;
    let uri = env.server.uri();

    let archive = env.archive("litx.tar.gz");
    write_tar_gz(&archive, &[("litx", b"v3")]);

    Mock::given(method("GET"))
        .and(path("/repos/pbrisbin/litx/releases/latest"))
        .and(header("authorization", "token private"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "tag_name": "v0.0.0.3", "assets": [] })),
        )
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/pbrisbin/litx/releases/tags/v0.0.0.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v0.0.0.3",
            "assets": [{
                "id": 7,
                "name": "litx-x86_64-linux.tar.gz",
                "url": format!("{uri}/repos/pbrisbin/litx/releases/assets/7"),
                "browser_download_url": "https://github.com/pbrisbin/litx/releases/download/v0.0.0.3/litx-x86_64-linux.tar.gz"
            }]
        })))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/pbrisbin/litx/releases/assets/7"))
        .and(header("accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(std::fs::read(&archive).unwrap()))
        .expect(1)
        .mount(&env.server)
        .await;

    let inputs = MapInputs::new()
        .with("name", "litx")
        .with(
            "url",
            "https://github.com/pbrisbin/litx/releases/download/v{version}/litx-x86_64-linux.tar.gz",
        )
        .with("github-token", "private");

    let outcome = env.run(linux_x64(), &inputs).await.unwrap();

    assert_eq!(outcome.tool.version, "0.0.0.3");
    assert_eq!(
        std::fs::read(outcome.dir.join("litx")).unwrap(),
        b"v3"
    );
    assert!(env.diagnostics.infos().iter().any(|line| line.starts_with("Located asset, 7")));
}

#[tokio::test]
async fn test_unparseable_asset_url_degrades_to_anonymous() {
    let env = Env::new().await;
    let archive = env.archive("tool.tar.gz");
    write_tar_gz(&archive, &[("tool", b"ok")]);
    env.serve_file("/tool.tar.gz", std::fs::read(&archive).unwrap(), 1)
        .await;

    let url = format!("{}/tool.tar.gz", env.server.uri());
    let inputs = MapInputs::new()
        .with("name", "tool")
        .with("version", "1.0")
        .with("url", url.clone())
        .with("github-token", "secret");

    let outcome = env.run(linux_x64(), &inputs).await.unwrap();

    assert!(Path::new(&outcome.dir).join("tool").exists());
    assert_eq!(
        env.diagnostics.errors(),
        vec![format!("{url} did not parse as a GitHub release asset")]
    );
}
