use crate::{AuthzResult, PolicySet};
use casbin::prelude::DefaultModel;
use casbin::{CoreApi, Enforcer, MemoryAdapter, MgmtApi};

const MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && (r.obj == p.obj || p.obj == "*") && (r.act == p.act || p.act == "*")
"#;

pub fn casbin_model_string() -> &'static str {
    MODEL
}

pub async fn casbin_model() -> AuthzResult<DefaultModel> {
    Ok(DefaultModel::from_str(MODEL).await?)
}

/// Load a [`PolicySet`] into an in-memory casbin enforcer.
///
/// Used to cross-check [`crate::Enforcer`] against the casbin evaluation of
/// the same rules.
pub async fn casbin_enforcer(policy_set: &PolicySet) -> AuthzResult<Enforcer> {
    let mut enforcer = Enforcer::new(casbin_model().await?, MemoryAdapter::default()).await?;

    let policies = policy_set
        .policies
        .iter()
        .map(|policy| {
            vec![
                policy.role.to_string(),
                policy.object.to_string(),
                policy.action.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    if !policies.is_empty() {
        enforcer.add_policies(policies).await?;
    }

    let groupings = policy_set
        .groupings
        .iter()
        .map(|grouping| vec![grouping.role.to_string(), grouping.inherits.to_string()])
        .collect::<Vec<_>>();
    if !groupings.is_empty() {
        enforcer.add_grouping_policies(groupings).await?;
    }

    enforcer.build_role_links()?;
    Ok(enforcer)
}
