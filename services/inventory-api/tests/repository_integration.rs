//! Repository behaviour against a real PostgreSQL.

mod common;

use common::{setup, unique};
use inventory_api::repository::{Changeset, RepositoryError};
use inventory_api::resources::{Brand, Role};
use inventory_api::Repository;

#[tokio::test]
#[ignore]
async fn soft_deleted_rows_are_hidden() {
    let (pool, _store, cleanup) = setup().await;
    let roles = Repository::<Role>::new(pool, cleanup);

    let role = roles
        .create(Changeset::new().set("name", unique("auditor")).set("description", None::<String>))
        .await
        .unwrap();

    assert!(roles.find_by_id(role.id).await.unwrap().is_some());
    assert!(roles.soft_delete(role.id).await.unwrap());

    assert!(roles.find_by_id(role.id).await.unwrap().is_none());
    assert!(roles.find_all().await.unwrap().iter().all(|r| r.id != role.id));

    // Mutations never touch a soft-deleted row.
    assert!(!roles.soft_delete(role.id).await.unwrap());
    let updated = roles
        .update(role.id, Changeset::new().set("name", "revived".to_string()))
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
#[ignore]
async fn replacing_logo_deletes_only_the_prior_object() {
    let (pool, store, cleanup) = setup().await;
    let brands = Repository::<Brand>::new(pool, cleanup);

    let old_key = format!("brands/{}-old.png", unique("brand"));
    let new_key = format!("brands/{}-new.png", unique("brand"));
    let old_url = store.seed(&old_key);

    let brand = brands
        .create(
            Changeset::new()
                .set("name", unique("Acme"))
                .set("website", None::<String>)
                .attachment(Some(old_url.clone())),
        )
        .await
        .unwrap();
    assert_eq!(brand.logo.as_deref(), Some(old_url.as_str()));

    // Update without a new file keeps the logo and deletes nothing.
    let kept = brands
        .update(
            brand.id,
            Changeset::new()
                .set("name", "Acme Renamed".to_string())
                .set("website", None::<String>),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.logo.as_deref(), Some(old_url.as_str()));
    assert!(store.contains(&old_key));

    let new_url = store.seed(&new_key);
    let replaced = brands
        .update(
            brand.id,
            Changeset::new()
                .set("name", "Acme Renamed".to_string())
                .set("website", None::<String>)
                .attachment(Some(new_url.clone())),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(replaced.logo.as_deref(), Some(new_url.as_str()));
    assert!(!store.contains(&old_key));
    assert!(store.contains(&new_key));
}

#[tokio::test]
#[ignore]
async fn deleting_a_brand_removes_its_logo() {
    let (pool, store, cleanup) = setup().await;
    let brands = Repository::<Brand>::new(pool.clone(), cleanup);

    let key = format!("brands/{}-logo.png", unique("brand"));
    let url = store.seed(&key);

    let brand = brands
        .create(
            Changeset::new()
                .set("name", unique("Gone"))
                .set("website", None::<String>)
                .attachment(Some(url)),
        )
        .await
        .unwrap();

    assert!(brands.soft_delete(brand.id).await.unwrap());
    assert!(!store.contains(&key));

    let completed: Option<bool> = sqlx::query_scalar(
        "SELECT completed_at IS NOT NULL FROM object_deletions WHERE object_key = $1",
    )
    .bind(&key)
    .fetch_optional(&pool)
    .await
    .unwrap();
    assert_eq!(completed, Some(true));
}

#[tokio::test]
#[ignore]
async fn failed_update_discards_the_new_upload() {
    let (pool, store, cleanup) = setup().await;
    let brands = Repository::<Brand>::new(pool, cleanup);

    let key = format!("brands/{}-orphan.png", unique("brand"));
    let url = store.seed(&key);

    let result = brands
        .update(
            i64::MAX,
            Changeset::new()
                .set("name", "Nobody".to_string())
                .set("website", None::<String>)
                .attachment(Some(url)),
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(!store.contains(&key));
}

#[tokio::test]
#[ignore]
async fn invalid_reference_is_rejected() {
    let (pool, _store, cleanup) = setup().await;
    let cities = Repository::<inventory_api::resources::City>::new(pool, cleanup);

    let err = cities
        .create(
            Changeset::new()
                .set("name", "Atlantis".to_string())
                .reference("country_id", "countries", Some(i64::MAX)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::InvalidReference {
            column: "country_id"
        }
    ));
}
