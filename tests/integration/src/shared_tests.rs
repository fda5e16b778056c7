//! Process-wide manager slot, in its own test binary

use bucket_core::shared::{clear_shared, set_shared, shared};
use bucket_core::{BucketManager, Error};
use bucket_test_utils::{ConfigBuilder, MockConnector};

#[tokio::test]
async fn test_shared_manager_sees_the_same_registry() {
    let manager = BucketManager::new(MockConnector::new());
    set_shared(&manager);

    let config = ConfigBuilder::new()
        .cluster("c1", "couchbase://a")
        .bucket("c1", "b1")
        .repository("r1", "c1", "b1")
        .build();
    manager.add([config]).unwrap();

    let from_slot = shared::<MockConnector>().unwrap().unwrap();
    assert_eq!(from_slot.get_bucket_name("r1").unwrap(), "b1");

    struct Unused;
    #[async_trait::async_trait]
    impl bucket_core::Connector for Unused {
        type Cluster = ();
        type Bucket = ();

        fn open_cluster(
            &self,
            _: &str,
            _: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<(), bucket_core::ConnectorError> {
            Ok(())
        }

        async fn open_bucket(
            &self,
            _: &(),
            _: &str,
            _: Option<&str>,
        ) -> Result<(), bucket_core::ConnectorError> {
            Ok(())
        }
    }
    assert!(matches!(
        shared::<Unused>(),
        Err(Error::InvalidArgument { .. })
    ));

    assert!(clear_shared());
    assert!(shared::<MockConnector>().unwrap().is_none());
}
