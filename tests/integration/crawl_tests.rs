//! Integration tests for the mirror pipeline
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full mirror cycle end-to-end.

use std::fs;
use std::path::Path;
use std::time::Duration;
use sumi_mirror::config::{Config, CrawlConfig};
use sumi_mirror::crawler::{mirror, Coordinator};
use sumi_mirror::linkfix::{LinkFixer, ReplacementPolicy};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at the mock server's root
fn create_test_config(server: &MockServer, output: &Path) -> Config {
    let mut crawl = CrawlConfig::with_seeds(vec![format!("{}/", server.uri())]);
    crawl.delay_ms = 0;
    crawl.timeout_secs = 5;
    Config::new(crawl, output)
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_bytes(body)
}

fn typed(content_type: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", content_type)
        .set_body_bytes(body)
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

async fn mount_small_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title>
<link rel="stylesheet" href="/style.css?v=1">
<link rel="stylesheet" href="/style.css?v=2">
</head><body>
<img src="/logo.png" alt="logo"><img src="logo.png" alt="logo again">
<a href="/about">About</a>
</body></html>"#,
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(
            r#"<html><head><title>About</title></head><body>
<img src="/logo.png"><a href="/about/team">Team</a>
</body></html>"#,
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(typed("text/css", "body{margin:0}"))
        .expect(2)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89u8, b'P', b'N', b'G']),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_mirror_with_depth_limit() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    Mock::given(method("GET"))
        .and(path("/about/team"))
        .respond_with(html("<p>team</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let site = dir.path().join("site");
    let mut config = create_test_config(&server, &site);
    config.crawl.max_depth = Some(1);
    config.output.sitemap = true;

    let report = mirror(config).await.expect("mirror failed");

    assert_eq!(report.pages_fetched, 2);
    assert!(report.pages_failed.is_empty());
    assert!(!report.interrupted);

    // Two query variants of the stylesheet plus one logo
    assert_eq!(report.assets.resolved, 3);
    assert_eq!(files_in(&site.join("css")), 2);
    assert_eq!(files_in(&site.join("images")), 1);

    let home = fs::read_to_string(site.join("index.html")).unwrap();
    assert_eq!(home.matches(r#"src="images/logo.png""#).count(), 2);
    assert!(home.contains(r#"<a href="about/index.html">About</a>"#));
    assert_eq!(home.matches(r#"href="css/"#).count(), 2);

    let about = fs::read_to_string(site.join("about/index.html")).unwrap();
    assert!(about.contains(r#"src="../images/logo.png""#));
    // Beyond max-depth, so left for the link fixer
    assert!(about.contains(r#"href="/about/team""#));

    let sitemap = fs::read_to_string(site.join("sitemap.html")).unwrap();
    assert!(sitemap.contains("<a href=\"about/index.html\">About</a>"));
}

#[tokio::test]
async fn test_unresolved_asset_keeps_absolute_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<img src="/missing.png"><img src="/missing.png">"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_config(&server, dir.path())).await.unwrap();

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.assets.unresolved.len(), 1);
    assert_eq!(report.assets.unresolved[0].1, "HTTP status 404");
    assert!(report.has_failures());

    let home = fs::read_to_string(dir.path().join("index.html")).unwrap();
    let absolute = format!(r#"src="{}/missing.png""#, server.uri());
    assert_eq!(home.matches(&absolute).count(), 2);
}

#[tokio::test]
async fn test_failed_page_does_not_stop_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/broken">x</a><a href="/fine">y</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine"))
        .respond_with(html("<p>fine</p>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_config(&server, dir.path())).await.unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.pages_failed.len(), 1);
    assert!(report.pages_failed[0].0.ends_with("/broken"));
    assert!(dir.path().join("fine/index.html").exists());
}

#[tokio::test]
async fn test_consolidation_preserves_reference_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<head><link rel="stylesheet" href="/b.css"><link rel="stylesheet" href="/a.css"><script src="/app.js"></script></head>"#,
        ))
        .mount(&server)
        .await;
    // The first stylesheet finishes last
    Mock::given(method("GET"))
        .and(path("/b.css"))
        .respond_with(typed("text/css", "b{}").set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.css"))
        .respond_with(typed("text/css", "a{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(typed("application/javascript", "run();"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.assets.consolidate = true;

    let report = mirror(config).await.unwrap();
    assert_eq!(report.bundles.len(), 2);

    let styles = fs::read_to_string(dir.path().join("css/all-styles.css")).unwrap();
    assert_eq!(
        styles,
        format!(
            "/* Source: {uri}/b.css */\nb{{}}\n\n/* Source: {uri}/a.css */\na{{}}\n\n",
            uri = server.uri()
        )
    );

    let home = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert_eq!(
        home,
        r#"<head><link rel="stylesheet" href="css/all-styles.css"><script src="js/all-scripts.js"></script></head>"#
    );
}

#[tokio::test]
async fn test_local_file_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/hero.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xffu8, 0xd8]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let saved = dir.path().join("saved.html");
    fs::write(
        &saved,
        format!(
            r#"<html><head><base href="{}/"></head><body><img src="img/hero.jpg"></body></html>"#,
            server.uri()
        ),
    )
    .unwrap();

    let site = dir.path().join("site");
    let mut config = create_test_config(&server, &site);
    config.crawl.seeds.clear();
    config.crawl.local_file = Some(saved);

    let report = mirror(config).await.unwrap();

    assert_eq!(report.pages_fetched, 1);
    let page = fs::read_to_string(site.join("index.html")).unwrap();
    assert_eq!(
        page,
        r#"<html><head></head><body><img src="images/hero.jpg"></body></html>"#
    );
}

#[tokio::test]
async fn test_stop_flag_leaves_pages_unfetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<p>never</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&server, dir.path())).unwrap();
    coordinator
        .stop_handle()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let report = coordinator.run().await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.pages_fetched, 0);
    assert_eq!(report.pages_unfetched, 1);
}

#[tokio::test]
async fn test_mirror_then_fix_links() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let dir = TempDir::new().unwrap();
    let site = dir.path().join("site");
    let mut config = create_test_config(&server, &site);
    config.crawl.max_depth = Some(1);
    mirror(config).await.unwrap();

    let report = LinkFixer::new(
        &site,
        ReplacementPolicy::LocalFallback("index.html".to_string()),
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(report.links_fixed, 1);
    assert_eq!(report.entries[0].original, "/about/team");
    let about = fs::read_to_string(site.join("about/index.html")).unwrap();
    assert!(about.contains(r#"<a href="../index.html">Team</a>"#));
}

#[tokio::test]
async fn test_consolidation_inlines_import_of_later_stylesheet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<head><link rel="stylesheet" href="/a.css"><link rel="stylesheet" href="/b.css"></head>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.css"))
        .respond_with(typed("text/css", "a{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.css"))
        .respond_with(typed("text/css", "@import url(theme.css);\nb{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/theme.css"))
        .respond_with(typed("text/css", "t{}"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.assets.consolidate = true;

    mirror(config).await.unwrap();

    let styles = fs::read_to_string(dir.path().join("css/all-styles.css")).unwrap();
    assert_eq!(
        styles,
        format!(
            "/* Source: {uri}/a.css */\na{{}}\n\n\
             /* Source: {uri}/b.css */\n/* Imported: css/theme.css */\nt{{}}\n\nb{{}}\n\n",
            uri = server.uri()
        )
    );
    assert!(!styles.contains("@import"));
}

#[tokio::test]
async fn test_font_cdn_stylesheets_stay_external() {
    let server = MockServer::start().await;
    let font_server = MockServer::start().await;
    let font_port = font_server.address().port();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<head><link rel="stylesheet" href="https://fonts.googleapis.com/css2?family=Inter"><link rel="stylesheet" href="http://localhost:{font_port}/css2?family=Roboto"><link rel="stylesheet" href="/site.css"></head>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site.css"))
        .respond_with(typed("text/css", "body{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(typed("text/css", "@font-face{}"))
        .expect(0)
        .mount(&font_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.assets.font_hosts.push("localhost".to_string());

    let report = mirror(config).await.unwrap();

    assert_eq!(report.assets.kept_external.len(), 2);
    assert_eq!(report.assets.resolved, 1);
    let home = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(home.contains(r#"href="https://fonts.googleapis.com/css2?family=Inter""#));
    assert!(home.contains(&format!(
        r#"href="http://localhost:{font_port}/css2?family=Roboto""#
    )));
    assert!(home.contains(r#"href="css/site.css""#));
}

#[tokio::test]
async fn test_font_cdn_downloaded_when_not_kept_external() {
    let server = MockServer::start().await;
    let font_server = MockServer::start().await;
    let font_port = font_server.address().port();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<head><link rel="stylesheet" href="http://localhost:{font_port}/css2?family=Roboto"></head>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/css2"))
        .respond_with(typed(
            "text/css",
            "@font-face{font-family:Roboto;src:url(/s/roboto.woff2) format('woff2')}",
        ))
        .expect(1)
        .mount(&font_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/s/roboto.woff2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "font/woff2")
                .set_body_bytes(b"wOF2".to_vec()),
        )
        .expect(1)
        .mount(&font_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.assets.font_hosts.push("localhost".to_string());
    config.assets.keep_external_fonts = false;

    let report = mirror(config).await.unwrap();

    assert!(report.assets.kept_external.is_empty());
    assert_eq!(report.assets.resolved, 2);
    assert_eq!(files_in(&dir.path().join("css")), 1);
    assert_eq!(
        fs::read(dir.path().join("fonts/roboto.woff2")).unwrap(),
        b"wOF2"
    );

    let home = fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(!home.contains("localhost"));
    let css_entry = fs::read_dir(dir.path().join("css"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let css = fs::read_to_string(css_entry.path()).unwrap();
    assert!(css.contains("url(../fonts/roboto.woff2)"));
}

/// The `src` of the first `<img>` in `html`
fn first_img_src(html: &str) -> &str {
    html.split("<img src=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
}

#[tokio::test]
async fn test_page_and_asset_paths_never_collide() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/images/logo.png">Full size</a><img src="/thumbs/logo.png">"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"FULLSIZE".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/thumbs/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"THUMB".to_vec()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_config(&server, dir.path())).await.unwrap();
    assert_eq!(report.pages_fetched, 2);

    let home = fs::read_to_string(dir.path().join("index.html")).unwrap();
    let thumb = first_img_src(&home);
    assert!(home.contains(r#"<a href="images/logo.png">"#));
    assert_ne!(thumb, "images/logo.png");

    assert_eq!(fs::read(dir.path().join(thumb)).unwrap(), b"THUMB");
    assert_eq!(
        fs::read(dir.path().join("images/logo.png")).unwrap(),
        b"FULLSIZE"
    );
}
