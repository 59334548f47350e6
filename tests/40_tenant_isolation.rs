mod common;

use anyhow::Result;
use serde_json::{json, Map};

use common::{ctx, fresh_tenant, id_string, object};

#[tokio::test]
async fn other_tenants_cannot_see_or_touch_rows() -> Result<()> {
    let Some(service) = common::service().await? else { return Ok(()) };
    let (owner, intruder) = (fresh_tenant(), fresh_tenant());
    let mine = ctx(owner, json!({}));
    let theirs = ctx(intruder, json!({}));

    let id = id_string(&service.create("customers", &mine, &object(json!({ "Name": "Private" })), &Map::new()).await?);

    assert!(service.find_by_id("customers", &theirs, &id).await?.is_none());
    assert_eq!(service.read_list_by("customers", &theirs).await?.count, 0);
    assert_eq!(service.update("customers", &theirs, &id, &object(json!({ "Name": "Stolen" })), &Map::new()).await?, 0);
    assert_eq!(service.soft_delete("customers", &theirs, &id).await?, 0);
    assert_eq!(service.hard_delete("customers", &theirs, &id).await?, 0);

    let row = service.find_by_id("customers", &mine, &id).await?.expect("owner still sees the row");
    assert_eq!(row["Name"], json!("Private"));
    assert!(row["ArchivedDate"].is_null());
    Ok(())
}
