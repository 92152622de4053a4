use classifieds_api::storage::{MockStorageService, S3StorageClient, StorageService, sanitize_key};
use uuid::Uuid;

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "ads/bike.png";
        let url = mock
            .get_presigned_upload_url(key, "image/png")
            .await
            .expect("mock presign should succeed");

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();

        assert!(mock.get_presigned_upload_url("ads/a.png", "image/png").await.is_err());
        assert!(mock.delete_object("ads/a.png").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .get_presigned_upload_url("../../etc/passwd", "image/png")
            .await
            .unwrap();

        assert!(!url.contains(".."));
        assert!(url.contains("etc/passwd"));
    }

    #[tokio::test]
    async fn test_mock_records_deletions_across_clones() {
        let mock = MockStorageService::new();
        let handle = mock.clone();

        mock.delete_object("ads/old.png").await.unwrap();
        mock.delete_object("avatars/./me.jpg").await.unwrap();

        assert_eq!(
            handle.deleted_keys().await,
            vec!["ads/old.png".to_string(), "avatars/me.jpg".to_string()]
        );
    }

    #[test]
    fn test_sanitize_key_strips_navigation() {
        assert_eq!(sanitize_key("ads//../x.png"), "ads/x.png");
        assert_eq!(sanitize_key("./avatars/y.gif"), "avatars/y.gif");
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await;

        // Presigning is computed locally; no server is contacted.
        let key = format!("ads/{}.png", Uuid::new_v4());
        let url = client
            .get_presigned_upload_url(&key, "image/png")
            .await
            .expect("presign should succeed offline");

        assert!(url.contains("localhost:9000"));
        assert!(url.contains("testbucket"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Signature"));
    }
}
