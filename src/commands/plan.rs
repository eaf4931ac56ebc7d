use anyhow::Result;

use crate::Context;
use crate::cli::{PlanArgs, PlanFormat};

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let mut stack = super::load_stack(ctx, &args.stack)?;
    if !args.targets.is_empty() {
        stack.focus(&args.targets)?;
    }
    match args.format {
        PlanFormat::Text => print!("{}", stack.render_text()),
        PlanFormat::Json => println!("{}", stack.render_json()?),
        PlanFormat::Dot => print!("{}", stack.render_dot()),
    }
    Ok(())
}
