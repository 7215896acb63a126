//! Prints every switch CRD as a multi-document YAML stream.
//!
//! ```text
//! cargo run -p crds --bin crdgen > config/crds.yaml
//! ```

use crds::{
    AnsibleSwitch, OVSSwitch, Switch, SwitchPort, SwitchPortConfiguration, SwitchResource,
    SwitchResourceLimit,
};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let definitions = [
        Switch::crd(),
        SwitchPort::crd(),
        SwitchPortConfiguration::crd(),
        SwitchResource::crd(),
        SwitchResourceLimit::crd(),
        OVSSwitch::crd(),
        AnsibleSwitch::crd(),
    ];

    for crd in definitions {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }

    Ok(())
}
