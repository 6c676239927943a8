use super::Context;
use anyhow::Result;

pub fn print(context: &Context) -> Result<()> {
    print!("{}", context.config.to_toml_string()?);
    println!(
        "# roster: {} staff, {} therapists, {} patients",
        context.roster.staff.len(),
        context.roster.therapists.len(),
        context.roster.patients.len()
    );
    Ok(())
}
