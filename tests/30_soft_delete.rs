mod common;

use anyhow::Result;
use serde_json::{json, Map};

use common::{ctx, fresh_tenant, id_string, object};

#[tokio::test]
async fn soft_delete_hides_and_restore_returns() -> Result<()> {
    let Some(service) = common::service().await? else { return Ok(()) };
    let tenant = fresh_tenant();
    let c = ctx(tenant, json!({}));

    let id = id_string(&service.create("customers", &c, &object(json!({ "Name": "Ephemeral" })), &Map::new()).await?);
    assert_eq!(service.read_list_by("customers", &c).await?.count, 1);

    assert_eq!(service.soft_delete("customers", &c, &id).await?, 1);
    assert_eq!(service.read_list_by("customers", &c).await?.count, 0);

    // a second soft delete is harmless and leaves the row archived
    assert_eq!(service.soft_delete("customers", &c, &id).await?, 1);
    assert_eq!(service.read_list_by("customers", &c).await?.count, 0);

    let archived = service.read_list_by("customers", &ctx(tenant, json!({ "archived": "1" }))).await?;
    assert_eq!(archived.count, 1);
    let row = service.find_by_id("customers", &c, &id).await?.expect("archived rows stay addressable");
    assert!(row["ArchivedDate"].is_string());

    assert_eq!(service.restore("customers", &c, &id).await?, 1);
    assert_eq!(service.read_list_by("customers", &c).await?.count, 1);

    assert_eq!(service.restore("customers", &c, &id).await?, 1);
    assert_eq!(service.read_list_by("customers", &c).await?.count, 1);
    let row = service.find_by_id("customers", &c, &id).await?.expect("restored row");
    assert!(row["ArchivedDate"].is_null());
    Ok(())
}

#[tokio::test]
async fn update_with_archived_date_restores() -> Result<()> {
    let Some(service) = common::service().await? else { return Ok(()) };
    let c = ctx(fresh_tenant(), json!({}));

    let id = id_string(&service.create("customers", &c, &object(json!({ "Name": "Back" })), &Map::new()).await?);
    service.soft_delete("customers", &c, &id).await?;
    service.update("customers", &c, &id, &object(json!({ "ArchivedDate": true })), &Map::new()).await?;

    let row = service.find_by_id("customers", &c, &id).await?.expect("row");
    assert!(row["ArchivedDate"].is_null());
    Ok(())
}
