mod common;

use mockito::Matcher;

use common::*;

const LINK: &str = "https://seafile.example.com/f/abc123/";

#[tokio::test]
async fn missing_folder_levels_are_created() {
    let mut server = mockito::Server::new_async().await;
    mock_list_repos(&mut server).await;
    mock_account_info(&mut server).await;
    // Empty library: both levels have to be created.
    server
        .mock("GET", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    server
        .mock("GET", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/apps".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let mkdir_apps = server
        .mock("POST", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/apps".into()))
        .match_body(Matcher::UrlEncoded("operation".into(), "mkdir".into()))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let mkdir_leaf = server
        .mock("POST", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/apps/seaflink".into()))
        .match_body(Matcher::UrlEncoded("operation".into(), "mkdir".into()))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    mock_upload_link(&mut server).await;
    mock_upload_endpoint(&mut server).await;
    mock_shared_link(&mut server, LINK).await;

    let t = logged_in_account(&server);
    let (observer, mut rx) = RecordingObserver::new();
    let (_dir, file) = temp_upload("att.txt");

    t.account.upload_file(file, observer.clone()).unwrap();
    rx.recv().await.unwrap();

    assert_eq!(
        observer.sequence(),
        vec!["start att.txt", "stop att.txt Ok"]
    );
    mkdir_apps.assert_async().await;
    mkdir_leaf.assert_async().await;
}

#[tokio::test]
async fn resolved_folder_is_cached_across_uploads() {
    let mut server = mockito::Server::new_async().await;
    mock_list_repos(&mut server).await;
    mock_account_info(&mut server).await;
    // Both levels already exist; each is listed exactly once even though
    // two uploads run.
    let root = server
        .mock("GET", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/".into()))
        .with_status(200)
        .with_body(r#"[{"name": "apps", "type": "dir"}]"#)
        .expect(1)
        .create_async()
        .await;
    let apps = server
        .mock("GET", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/apps".into()))
        .with_status(200)
        .with_body(r#"[{"name": "seaflink", "type": "dir"}]"#)
        .expect(1)
        .create_async()
        .await;
    mock_upload_link(&mut server).await;
    mock_upload_endpoint(&mut server).await;
    mock_shared_link(&mut server, LINK).await;

    let t = logged_in_account(&server);
    let (observer, mut rx) = RecordingObserver::new();
    let (_dir_a, first) = temp_upload("first.pdf");
    let (_dir_b, second) = temp_upload("second.pdf");

    t.account.upload_file(first, observer.clone()).unwrap();
    t.account.upload_file(second, observer.clone()).unwrap();
    rx.recv().await.unwrap();
    rx.recv().await.unwrap();

    assert_eq!(
        observer.sequence(),
        vec![
            "start first.pdf",
            "stop first.pdf Ok",
            "start second.pdf",
            "stop second.pdf Ok",
        ]
    );
    root.assert_async().await;
    apps.assert_async().await;
}
