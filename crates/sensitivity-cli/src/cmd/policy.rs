use crate::output::{print_json, print_table};
use clap::Subcommand;
use sensitivity_core::policy::{PolicyTable, StepOperation};
use sensitivity_core::types::Tier;
use std::path::Path;

#[derive(Subcommand)]
pub enum PolicySubcommand {
    /// List configured tiers
    List,

    /// Show the label and mandatory steps of one tier
    Show {
        /// Tier name (`unclassified`, `restricted`; `prob` is accepted)
        tier: String,
    },
}

pub fn run(config_path: &Path, subcmd: PolicySubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let policies = PolicyTable::from_config(&config)?;
    match subcmd {
        PolicySubcommand::List => list(&policies, json),
        PolicySubcommand::Show { tier } => show(&policies, &tier, json),
    }
}

fn list(policies: &PolicyTable, json: bool) -> anyhow::Result<()> {
    if json {
        let all: Vec<_> = policies.iter().collect();
        return print_json(&all);
    }
    if policies.is_empty() {
        println!("No tiers configured.");
        return Ok(());
    }

    let rows = policies
        .iter()
        .map(|p| {
            vec![
                p.tier.to_string(),
                p.label_id.clone(),
                p.security_category_tag.clone(),
                p.mandatory_steps.len().to_string(),
            ]
        })
        .collect();
    print_table(&["TIER", "LABEL", "CATEGORY", "STEPS"], rows);
    Ok(())
}

fn show(policies: &PolicyTable, tier: &str, json: bool) -> anyhow::Result<()> {
    let tier: Tier = tier.parse()?;
    let policy = policies.resolve(tier)?;
    if json {
        return print_json(policy);
    }

    println!("Tier:     {}", policy.tier);
    println!("Label:    {}", policy.label_id);
    println!("Category: {}", policy.security_category_tag);
    println!();

    let rows = policy
        .mandatory_steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            vec![
                (i + 1).to_string(),
                step.name.clone(),
                step.target().to_string(),
                describe(&step.operation),
            ]
        })
        .collect();
    print_table(&["#", "STEP", "TARGET", "OPERATION"], rows);
    Ok(())
}

fn describe(op: &StepOperation) -> String {
    match op {
        StepOperation::SetVisibility { visibility } => format!("set visibility {}", visibility.as_str()),
        StepOperation::RemoveOwner { owner_id } => format!("remove owner {owner_id}"),
        StepOperation::HandOverSiteAdministration { administrator } => {
            format!("hand site admin to {administrator}")
        }
        StepOperation::GrantRole {
            principals,
            role,
            isolate_default_library,
        } => {
            let mut s = format!("grant '{role}' to {}", principals.join(", "));
            if *isolate_default_library {
                s.push_str(" (library isolated)");
            }
            s
        }
    }
}
