mod common;

use common::{catalog_count, create_member, pivot_count, setup, sorted};
use platform_authz::AuthzError;

#[tokio::test]
async fn ungranted_permission_is_denied_and_named() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let permissions = authz.gate().permissions(&member);

    assert!(!permissions.has_permission_to("publish").await.unwrap());
    let err = permissions.check_permission_to("publish").await.unwrap_err();
    assert!(matches!(err, AuthzError::Forbidden(_)));
    assert_eq!(err.required_permissions(), ["publish"]);
    assert_eq!(err.to_string(), "User does not have permission to publish");

    permissions.give_permission_to(["publish"]).await.unwrap();
    assert!(permissions.check_permission_to("publish").await.unwrap());
}

#[tokio::test]
async fn granting_twice_keeps_one_row() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let permissions = authz.gate().permissions(&member);

    permissions.give_permission_to(["publish"]).await.unwrap();
    permissions.give_permission_to(["publish"]).await.unwrap();
    permissions.give_permission_to(["publish", "publish"]).await.unwrap();

    assert_eq!(pivot_count(&authz, "model_has_permissions", member.id).await, 1);
    assert_eq!(catalog_count(&authz, "permissions").await, 1);
    assert_eq!(permissions.get_permission_names().await.unwrap(), ["publish"]);
}

#[tokio::test]
async fn sync_replaces_the_direct_set() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let permissions = authz.gate().permissions(&member);

    permissions.give_permission_to(["legacy"]).await.unwrap();
    permissions.sync_permissions(["a", "b"]).await.unwrap();
    assert_eq!(
        sorted(permissions.get_permission_names().await.unwrap()),
        ["a", "b"]
    );

    permissions.sync_permissions(["c"]).await.unwrap();
    assert_eq!(permissions.get_permission_names().await.unwrap(), ["c"]);

    permissions.sync_permissions(Vec::<&str>::new()).await.unwrap();
    assert!(permissions.get_permission_names().await.unwrap().is_empty());
    // catalog rows outlive the grants
    assert_eq!(catalog_count(&authz, "permissions").await, 4);
}

#[tokio::test]
async fn empty_lists_are_boundary_cases() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let permissions = authz.gate().permissions(&member);
    let none: [&str; 0] = [];

    assert!(!permissions.has_any_permission(none).await.unwrap());
    assert!(permissions.has_all_permissions(none).await.unwrap());

    permissions.give_permission_to(["read"]).await.unwrap();
    assert!(!permissions.has_any_permission(none).await.unwrap());
    assert!(permissions.has_all_permissions(none).await.unwrap());
}

#[tokio::test]
async fn any_and_all_checks() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let permissions = authz.gate().permissions(&member);
    permissions.give_permission_to(["read", "write"]).await.unwrap();

    assert!(permissions.has_any_permission(["delete", "write"]).await.unwrap());
    assert!(!permissions.has_any_permission(["delete"]).await.unwrap());
    assert!(permissions.has_all_permissions(["read", "write"]).await.unwrap());
    assert!(!permissions.has_all_permissions(["read", "delete"]).await.unwrap());
}

#[tokio::test]
async fn revoke_removes_only_that_grant() {
    let authz = setup().await;
    let alice = create_member(&authz, "alice").await;
    let bob = create_member(&authz, "bob").await;
    let gate = authz.gate();

    gate.permissions(&alice).give_permission_to(["read", "write"]).await.unwrap();
    gate.permissions(&bob).give_permission_to(["write"]).await.unwrap();

    gate.permissions(&alice).revoke_permission_to("write").await.unwrap();
    assert_eq!(gate.permissions(&alice).get_permission_names().await.unwrap(), ["read"]);
    assert!(gate.permissions(&bob).has_permission_to("write").await.unwrap());

    gate.permissions(&alice).revoke_permission_to("never-created").await.unwrap();
    assert!(gate.find_permission("never-created").await.unwrap().is_none());
}

#[tokio::test]
async fn models_are_accepted_as_targets() {
    let authz = setup().await;
    let member = create_member(&authz, "alice").await;
    let gate = authz.gate();

    let publish = gate.create_permission("publish").await.unwrap();
    assert_eq!(gate.create_permission("publish").await.unwrap().id, publish.id);

    gate.permissions(&member).give_permission_to([&publish]).await.unwrap();
    assert!(gate.permissions(&member).has_permission_to(&publish).await.unwrap());

    let loaded = gate.permissions(&member).permissions().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "publish");
}

#[tokio::test]
async fn roles_hold_their_own_permissions() {
    let authz = setup().await;
    let gate = authz.gate();
    let editor = gate.create_role("editor").await.unwrap();

    gate.permissions(&editor).give_permission_to(["publish"]).await.unwrap();
    assert!(gate.permissions(&editor).has_permission_to("publish").await.unwrap());
    assert_eq!(pivot_count(&authz, "role_has_permissions", editor.id).await, 1);
}
