//! Unit tests for SwitchPort reconciler

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::finalizer;
    use crate::store::{MockStore, ResourceStore};
    use crate::test_utils::*;
    use crds::{PortPolicy, SwitchPort, SwitchPortState, SwitchState, SwitchStatus, TENANT_LIMIT_NAME};
    use kube::Resource;
    use state_machine::{Dirty, Instance, Requeue};
    use std::sync::Arc;
    use switch_backend::{FakeBackend, FakeCall};

    struct Fixture {
        store: MockStore,
        fake: FakeBackend,
        ctx: Arc<Context>,
        port: SwitchPort,
    }

    /// Switch `infra/sw1` committed with `policy` for eth1, a SwitchPort bound to
    /// `tenant-a/web` (untagged 5, tagged 7-8), and a tenant limit granting 1-10
    fn setup(policy: PortPolicy) -> Fixture {
        let store = MockStore::new();
        let fake = FakeBackend::new();
        let ctx = create_test_context(store.clone(), &fake);

        let mut switch = create_test_switch("sw1", "infra", &[("eth1", policy)]);
        switch.status = Some(SwitchStatus {
            state: SwitchState::Running,
            provider: switch.spec.provider.clone(),
            ports: switch.spec.ports.clone(),
            ..Default::default()
        });
        let switch = store.switches.insert(switch);

        let mut port = create_test_switch_port("eth1", "infra", Some(configuration_ref("web", "tenant-a")));
        port.metadata.owner_references = Some(vec![switch.controller_owner_ref(&()).unwrap()]);
        let port = store.switch_ports.insert(port);

        store
            .configurations
            .insert(create_test_configuration("web", "tenant-a", Some(5), "7-8"));
        store.limits.insert(create_test_limit("tenant-a", "1-10", None));

        Fixture { store, fake, ctx, port }
    }

    fn used_vlans(store: &MockStore) -> String {
        let limit = store.limits.find("tenant-a", TENANT_LIMIT_NAME).unwrap();
        limit.used_vlans().unwrap().to_string()
    }

    fn status_error(port: &SwitchPort) -> String {
        port.status.as_ref().and_then(|status| status.error.clone()).unwrap_or_default()
    }

    /// Steps the port through None, Idle, Verifying and Configuring
    async fn run_until_active(fixture: &mut Fixture) {
        for _ in 0..4 {
            step(&fixture.ctx, &mut fixture.port).await;
        }
        assert_eq!(fixture.port.state(), SwitchPortState::Active);
    }

    #[tokio::test]
    async fn test_port_reaches_active() {
        let mut fixture = setup(PortPolicy::default());
        let ctx = fixture.ctx.clone();

        // None → Idle installs the finalizer
        let outcome = step(&ctx, &mut fixture.port).await;
        assert_eq!(outcome.dirty, Dirty::All);
        assert!(finalizer::has(&fixture.port));
        assert_eq!(fixture.port.state(), SwitchPortState::Idle);

        step(&ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Verifying);

        // Verifying snapshots the configuration
        let outcome = step(&ctx, &mut fixture.port).await;
        assert!(outcome.error.is_none());
        assert_eq!(fixture.port.state(), SwitchPortState::Configuring);
        let status = fixture.port.status.clone().unwrap();
        assert_eq!(status.port_name.as_deref(), Some("eth1"));
        assert_eq!(status.tenant_namespace.as_deref(), Some("tenant-a"));
        assert_eq!(status.configuration.as_ref().unwrap().untagged_vlan, Some(5));
        assert!(fixture.fake.port("eth1").is_none());

        // Configuring pushes it and charges the quota
        step(&ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Active);
        assert_eq!(fixture.fake.port("eth1"), status.configuration);
        assert_eq!(used_vlans(&fixture.store), "5,7-8");

        // Active polls the device
        let outcome = step(&ctx, &mut fixture.port).await;
        assert_eq!(outcome.dirty, Dirty::None);
        assert_eq!(outcome.requeue, Requeue::After(ctx.requeue_after));
        assert_eq!(fixture.fake.calls().last(), Some(&FakeCall::GetPortAttr("eth1".to_string())));
    }

    #[tokio::test]
    async fn test_disabled_port_stays_verifying() {
        let mut fixture = setup(PortPolicy {
            disabled: true,
            ..Default::default()
        });
        for _ in 0..3 {
            step(&fixture.ctx, &mut fixture.port).await;
        }

        assert_eq!(fixture.port.state(), SwitchPortState::Verifying);
        assert!(status_error(&fixture.port).contains("disabled"));
        assert_eq!(status_error(&fixture.port), "handler error: the port is disabled");
        assert!(fixture.port.committed_configuration().is_none());
        assert!(fixture.fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vlan_outside_tenant_limit_is_rejected() {
        let mut fixture = setup(PortPolicy::default());
        fixture
            .store
            .configurations
            .insert(create_test_configuration("web", "tenant-a", Some(20), ""));
        for _ in 0..3 {
            step(&fixture.ctx, &mut fixture.port).await;
        }

        assert_eq!(fixture.port.state(), SwitchPortState::Verifying);
        assert_eq!(
            status_error(&fixture.port),
            "handler error: vlan 20 is out of permissible range"
        );
        assert_eq!(used_vlans(&fixture.store), "");
    }

    #[tokio::test]
    async fn test_trunk_disabled_rejects_tagged_vlans() {
        let mut fixture = setup(PortPolicy {
            trunk_disabled: true,
            ..Default::default()
        });
        for _ in 0..3 {
            step(&fixture.ctx, &mut fixture.port).await;
        }
        assert_eq!(fixture.port.state(), SwitchPortState::Verifying);
        assert!(status_error(&fixture.port).contains("tagged vlans are not allowed"));
    }

    #[tokio::test]
    async fn test_unlisted_port_is_rejected() {
        let mut fixture = setup(PortPolicy::default());
        fixture.port.metadata.name = Some("eth9".to_string());
        for _ in 0..3 {
            step(&fixture.ctx, &mut fixture.port).await;
        }
        assert_eq!(fixture.port.state(), SwitchPortState::Verifying);
        assert!(status_error(&fixture.port).contains("not listed by switch sw1"));
    }

    #[tokio::test]
    async fn test_port_without_configuration_idles() {
        let mut fixture = setup(PortPolicy::default());
        fixture.port.spec.configuration = None;
        step(&fixture.ctx, &mut fixture.port).await;

        let outcome = step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Idle);
        assert_eq!(outcome.requeue, Requeue::After(fixture.ctx.requeue_after));
    }

    #[tokio::test]
    async fn test_missing_tenant_limit_skips_quota() {
        let mut fixture = setup(PortPolicy::default());
        fixture
            .store
            .delete_switch_resource_limit("tenant-a", TENANT_LIMIT_NAME)
            .await
            .unwrap();

        run_until_active(&mut fixture).await;
        assert!(fixture.fake.port("eth1").is_some());
    }

    #[tokio::test]
    async fn test_external_change_is_reverted() {
        let mut fixture = setup(PortPolicy::default());
        run_until_active(&mut fixture).await;
        let applied = fixture.fake.port("eth1").unwrap();

        let mut tampered = applied.clone();
        tampered.untagged_vlan = Some(99);
        fixture.fake.set_port("eth1", tampered);

        step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Configuring);
        step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Active);
        assert_eq!(fixture.fake.port("eth1"), Some(applied));
        assert_eq!(used_vlans(&fixture.store), "5,7-8");
    }

    #[tokio::test]
    async fn test_configuration_edit_is_reapplied() {
        let mut fixture = setup(PortPolicy::default());
        run_until_active(&mut fixture).await;

        fixture
            .store
            .configurations
            .insert(create_test_configuration("web", "tenant-a", Some(6), "7-8"));

        // Active → Cleaning → Idle releases the old VLANs
        step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Cleaning);
        step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Idle);
        assert!(fixture.fake.port("eth1").is_none());
        assert_eq!(used_vlans(&fixture.store), "");

        // Idle → Verifying → Configuring → Active applies the new one
        for _ in 0..3 {
            step(&fixture.ctx, &mut fixture.port).await;
        }
        assert_eq!(fixture.port.state(), SwitchPortState::Active);
        assert_eq!(fixture.fake.port("eth1").unwrap().untagged_vlan, Some(6));
        assert_eq!(used_vlans(&fixture.store), "6-8");
    }

    #[tokio::test]
    async fn test_unbinding_cleans_port() {
        let mut fixture = setup(PortPolicy::default());
        run_until_active(&mut fixture).await;

        fixture.port.spec.configuration = None;
        step(&fixture.ctx, &mut fixture.port).await;
        step(&fixture.ctx, &mut fixture.port).await;

        assert_eq!(fixture.port.state(), SwitchPortState::Idle);
        let status = fixture.port.status.clone().unwrap();
        assert_eq!(status.configuration, None);
        assert_eq!(status.port_name, None);
        assert_eq!(status.tenant_namespace, None);
        assert_eq!(used_vlans(&fixture.store), "");
        assert!(
            fixture
                .fake
                .calls()
                .iter()
                .any(|call| matches!(call, FakeCall::ResetPort(port, _) if port == "eth1"))
        );
    }

    #[tokio::test]
    async fn test_deleting_port_cleans_then_releases() {
        let mut fixture = setup(PortPolicy::default());
        run_until_active(&mut fixture).await;

        mark_deleting(&mut fixture.port);
        step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Cleaning);
        step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(fixture.port.state(), SwitchPortState::Deleting);

        let outcome = step(&fixture.ctx, &mut fixture.port).await;
        assert_eq!(outcome.requeue, Requeue::None);
        assert_eq!(outcome.dirty, Dirty::MetadataAndSpec);
        assert!(!finalizer::has(&fixture.port));
        assert!(fixture.fake.port("eth1").is_none());
        assert_eq!(used_vlans(&fixture.store), "");
    }

    #[tokio::test]
    async fn test_orphaned_port_still_releases_quota() {
        let mut fixture = setup(PortPolicy::default());
        run_until_active(&mut fixture).await;

        let switch = fixture.store.switches.find("infra", "sw1").unwrap();
        fixture.store.delete_switch(&switch, false).await.unwrap();
        assert!(fixture.store.switches.find("infra", "sw1").is_none());

        mark_deleting(&mut fixture.port);
        step(&fixture.ctx, &mut fixture.port).await;
        step(&fixture.ctx, &mut fixture.port).await;

        assert_eq!(fixture.port.state(), SwitchPortState::Deleting);
        assert_eq!(fixture.port.status.as_ref().unwrap().error, None);
        assert!(
            !fixture
                .fake
                .calls()
                .iter()
                .any(|call| matches!(call, FakeCall::ResetPort(..)))
        );
        assert_eq!(used_vlans(&fixture.store), "");
    }

    #[tokio::test]
    async fn test_reconcile_persists_port_status() {
        let fixture = setup(PortPolicy::default());
        let stored = |store: &MockStore| store.switch_ports.find("infra", "eth1").unwrap();

        for _ in 0..4 {
            reconcile(&fixture.ctx, stored(&fixture.store)).await;
        }

        let port = stored(&fixture.store);
        assert_eq!(port.state(), SwitchPortState::Active);
        assert!(finalizer::has(&port));
        assert_eq!(port.port_name(), Some("eth1"));
        assert_eq!(used_vlans(&fixture.store), "5,7-8");
        assert!(port.meta().resource_version.is_some());
    }

    #[tokio::test]
    async fn test_shared_vlans_stay_used_until_last_port_is_cleaned() {
        let fixture = setup(PortPolicy::default());
        let store = &fixture.store;

        // eth2 on the same switch, bound to the same tenant configuration
        let mut switch = store.switches.find("infra", "sw1").unwrap();
        switch.spec.ports.insert("eth2".to_string(), PortPolicy::default());
        switch.status.as_mut().unwrap().ports = switch.spec.ports.clone();
        let switch = store.switches.insert(switch);
        let mut eth2 = create_test_switch_port("eth2", "infra", Some(configuration_ref("web", "tenant-a")));
        eth2.metadata.owner_references = Some(vec![switch.controller_owner_ref(&()).unwrap()]);
        store.switch_ports.insert(eth2);

        let stored = |name: &str| store.switch_ports.find("infra", name);
        for name in ["eth1", "eth2"] {
            for _ in 0..4 {
                reconcile(&fixture.ctx, stored(name).unwrap()).await;
            }
            assert_eq!(stored(name).unwrap().state(), SwitchPortState::Active);
        }
        assert_eq!(used_vlans(store), "5,7-8");

        // eth1 goes away; eth2 still carries 5 and 7-8
        store.delete_switch_port("infra", "eth1").await.unwrap();
        for _ in 0..3 {
            reconcile(&fixture.ctx, stored("eth1").unwrap()).await;
        }
        assert!(stored("eth1").is_none());
        assert!(fixture.fake.port("eth1").is_none());
        assert_eq!(fixture.fake.port("eth2").unwrap().untagged_vlan, Some(5));
        assert_eq!(used_vlans(store), "5,7-8");

        // The last port releases them
        store.delete_switch_port("infra", "eth2").await.unwrap();
        for _ in 0..3 {
            reconcile(&fixture.ctx, stored("eth2").unwrap()).await;
        }
        assert!(stored("eth2").is_none());
        assert_eq!(used_vlans(store), "");
    }
}
