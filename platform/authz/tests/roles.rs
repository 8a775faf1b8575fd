mod common;

use common::{catalog_count, create_member, pivot_count, setup, sorted};

#[tokio::test]
async fn assigning_twice_lists_the_role_once() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let roles = authz.gate().roles(&member);

    roles.assign_role(["x"]).await.unwrap();
    roles.assign_role(["x"]).await.unwrap();

    assert_eq!(roles.get_role_names().await.unwrap(), ["x"]);
    assert_eq!(pivot_count(&authz, "model_has_roles", member.id).await, 1);
    assert_eq!(catalog_count(&authz, "roles").await, 1);
}

#[tokio::test]
async fn revoking_a_role_keeps_the_role_and_its_permissions() {
    let authz = setup().await;
    let alice = create_member(&authz, "alice").await;
    let bob = create_member(&authz, "bob").await;
    let gate = authz.gate();

    let editor = gate.create_role("editor").await.unwrap();
    gate.permissions(&editor).give_permission_to(["publish"]).await.unwrap();
    gate.roles(&alice).assign_role(["editor"]).await.unwrap();
    gate.roles(&bob).assign_role(["editor"]).await.unwrap();

    gate.roles(&alice).revoke_role("editor").await.unwrap();

    assert!(!gate.roles(&alice).has_role("editor").await.unwrap());
    assert!(gate.roles(&bob).has_role("editor").await.unwrap());
    assert_eq!(pivot_count(&authz, "model_has_roles", alice.id).await, 0);
    assert_eq!(pivot_count(&authz, "model_has_roles", bob.id).await, 1);

    let kept = gate.find_role("editor").await.unwrap().expect("role survives");
    assert_eq!(kept.id, editor.id);
    assert!(gate.permissions(&kept).has_permission_to("publish").await.unwrap());

    let carol = create_member(&authz, "carol").await;
    gate.roles(&carol).assign_role([&kept]).await.unwrap();
    assert!(gate.authorizable(&carol).with_permission_to("publish").await.unwrap());
}

#[tokio::test]
async fn sync_replaces_assigned_roles() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let roles = authz.gate().roles(&member);

    roles.assign_role(["admin"]).await.unwrap();
    roles.sync_roles(["editor", "viewer"]).await.unwrap();
    assert_eq!(sorted(roles.get_role_names().await.unwrap()), ["editor", "viewer"]);

    roles.sync_roles(["viewer"]).await.unwrap();
    let loaded = roles.roles().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "viewer");
}

#[tokio::test]
async fn any_and_all_role_checks() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let roles = authz.gate().roles(&member);
    let none: [&str; 0] = [];

    assert!(!roles.has_any_role(none).await.unwrap());
    assert!(roles.has_all_roles(none).await.unwrap());

    roles.assign_role(["admin", "editor"]).await.unwrap();
    assert!(roles.has_any_role(["viewer", "editor"]).await.unwrap());
    assert!(!roles.has_any_role(["viewer"]).await.unwrap());
    assert!(roles.has_all_roles(["admin", "editor"]).await.unwrap());
    assert!(!roles.has_all_roles(["admin", "viewer"]).await.unwrap());
}

#[tokio::test]
async fn revoking_an_unknown_role_creates_nothing() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;

    authz.gate().roles(&member).revoke_role("ghost").await.unwrap();
    assert_eq!(catalog_count(&authz, "roles").await, 0);
}
