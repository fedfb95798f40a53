//! Grave, cemetery and employee commands

use sgc_core::models::{BurialForm, GraveLocation, NewCemetery, NewEmployee, NewGraves};
use sgc_core::SyncEngine;

use crate::cli::{BurialArgs, CemeteryCommands, EmployeeCommands, GraveCommands, LocationArgs};
use crate::commands::common::{
    acting_session, format_cemetery_lines, format_employee_lines, format_grave_lines, print_json,
    print_lines, Context,
};
use crate::error::CliError;

impl From<LocationArgs> for GraveLocation {
    fn from(args: LocationArgs) -> Self {
        Self {
            cemetery_id: args.cemetery,
            block: args.block.trim().to_string(),
            lot: args.lot.trim().to_string(),
            plot: args.plot.trim().to_string(),
        }
    }
}

pub fn burial_form(args: BurialArgs) -> BurialForm {
    BurialForm {
        location: args.location.into(),
        deceased_name: args.deceased,
        birth_date: args.birth_date,
        death_date: args.death_date,
        cause_of_death: args.cause,
        death_certificate_number: args.certificate,
        issuing_body: args.issuing_body,
        responsible_name: args.responsible,
        responsible_document: args.document,
        responsible_phone: args.phone,
        responsible_address: args.address,
        gravedigger_id: args.gravedigger,
        authorization_number: args.authorization,
    }
}

pub async fn run_grave(
    engine: &SyncEngine,
    context: &Context,
    command: GraveCommands,
) -> Result<(), CliError> {
    match command {
        GraveCommands::Add {
            cemetery,
            block,
            lot,
            plot,
            kind,
            drawers,
            family,
            lat,
            lng,
        } => {
            let session = acting_session(engine, &context.user).await?;
            let created = engine
                .add_graves(
                    &session,
                    NewGraves {
                        cemetery_id: cemetery,
                        block,
                        lot,
                        plot,
                        kind: kind.into(),
                        drawers,
                        family_name: family,
                        latitude: lat,
                        longitude: lng,
                    },
                )
                .await?;
            for line in format_grave_lines(&created) {
                println!("Created {line}");
            }
        }
        GraveCommands::List { cemetery, json } => {
            let graves = engine
                .graves()
                .await
                .into_iter()
                .filter(|grave| cemetery.is_none_or(|id| grave.cemetery_id == id))
                .collect::<Vec<_>>();
            if json {
                return print_json(&graves);
            }
            print_lines(&format_grave_lines(&graves), "No graves registered.");
        }
        GraveCommands::Burial(args) => {
            let session = acting_session(engine, &context.user).await?;
            let grave = engine
                .register_burial(&session, burial_form(*args))
                .await?;
            println!("Burial recorded in {}", grave.label());
        }
        GraveCommands::RemoveBurial { location } => {
            let session = acting_session(engine, &context.user).await?;
            let grave = engine.remove_burial(&session, &location.into()).await?;
            println!("Burial removed from {}", grave.label());
        }
    }
    Ok(())
}

pub async fn run_cemetery(
    engine: &SyncEngine,
    context: &Context,
    command: CemeteryCommands,
) -> Result<(), CliError> {
    match command {
        CemeteryCommands::Add {
            name,
            address,
            postal_code,
            phone,
            lat,
            lng,
            manager,
        } => {
            let session = acting_session(engine, &context.user).await?;
            let cemetery = engine
                .add_cemetery(
                    &session,
                    NewCemetery {
                        name,
                        address,
                        postal_code,
                        phone,
                        latitude: lat,
                        longitude: lng,
                        manager,
                    },
                )
                .await?;
            println!("Created cemetery #{} {}", cemetery.id, cemetery.name);
        }
        CemeteryCommands::List { json } => {
            let cemeteries = engine.cemeteries().await;
            if json {
                return print_json(&cemeteries);
            }
            print_lines(&format_cemetery_lines(&cemeteries), "No cemeteries registered.");
        }
    }
    Ok(())
}

pub async fn run_employee(engine: &SyncEngine, command: EmployeeCommands) -> Result<(), CliError> {
    match command {
        EmployeeCommands::Add {
            name,
            role,
            registration,
        } => {
            let employee = engine
                .add_employee(NewEmployee {
                    name,
                    role: role.into(),
                    registration,
                })
                .await?;
            println!("Created employee #{} {}", employee.id, employee.name);
        }
        EmployeeCommands::List { json } => {
            let employees = engine.employees().await;
            if json {
                return print_json(&employees);
            }
            print_lines(&format_employee_lines(&employees), "No employees registered.");
        }
    }
    Ok(())
}
