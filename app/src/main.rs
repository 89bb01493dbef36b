use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use genopos::{
    Config, HttpBackend, LocalViewport, SearchBox, SubmitOutcome, Viewport,
};

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Quit,
    Assemblies,
    Assembly(&'a str),
    Zoom(f64),
    Pan(f64),
    Pick(usize),
    Edit(&'a str),
    Submit(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Result<Self> {
        let line = line.trim();

        let Some(cmd) = line.strip_prefix(':') else {
            return Ok(Command::Submit(line));
        };

        let (name, arg) = cmd.split_once(' ').unwrap_or((cmd, ""));
        let arg = arg.trim();

        let command = match name {
            "q" | "quit" => Command::Quit,
            "assemblies" => Command::Assemblies,
            "assembly" if !arg.is_empty() => Command::Assembly(arg),
            "zoom" => Command::Zoom(arg.parse()?),
            "pan" => Command::Pan(arg.parse()?),
            "pick" => Command::Pick(arg.parse()?),
            "edit" => Command::Edit(arg),
            _ => anyhow::bail!("unknown command `{line}`"),
        };

        Ok(command)
    }
}

async fn activate(
    search: &SearchBox,
    viewport: &LocalViewport,
    assembly: &str,
) -> Result<()> {
    if let Some(space) = search.on_assembly_selected(assembly).await? {
        let len = space.total_len() as f64;
        viewport.reset_base_domains([0.0, len], [0.0, len]);
    }
    Ok(())
}

async fn print_view(search: &SearchBox, viewport: &LocalViewport) {
    let view = search.view().await;
    let domains = viewport.domains();

    println!("{}", view.text);
    println!(
        "  [{}] x: {:.0}..{:.0}  y: {:.0}..{:.0}",
        view.assembly.as_deref().unwrap_or("-"),
        domains.x[0],
        domains.x[1],
        domains.y[0],
        domains.y[1],
    );

    for (i, s) in view.suggestions.iter().enumerate() {
        println!(
            "  {i:>2}: {} {}:{}-{}",
            s.gene_name, s.chromosome, s.tx_start, s.tx_end
        );
    }
}

async fn run(config: Config) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(config.timeout)?);
    let viewport = Arc::new(LocalViewport::square(1.0, config.viewport_px));
    let (_listener, events) = viewport.subscribe();

    let search = SearchBox::new(backend, viewport.clone(), &config);
    println!("{}", search.view().await.text);

    let available = search.discover().await;
    log::info!("available assemblies: {available:?}");

    let assembly = match &config.assembly {
        Some(assembly) => assembly.clone(),
        None => available.iter().next().cloned().ok_or_else(|| {
            anyhow::anyhow!("no assemblies available on {:?}", config.servers)
        })?,
    };

    activate(&search, &viewport, &assembly).await?;

    if let Some(range) = &config.init_range {
        search.drain_viewport_events(&events).await;
        search.on_user_edit(range).await;
        report(search.on_user_submit().await);
    }

    search.drain_viewport_events(&events).await;
    print_view(&search, &viewport).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Assemblies => {
                let view = search.view().await;
                for assembly in view.assemblies {
                    println!("  {assembly}");
                }
                continue;
            }
            Command::Assembly(assembly) => {
                if let Err(err) = activate(&search, &viewport, assembly).await
                {
                    eprintln!("{err:#}");
                }
            }
            Command::Zoom(factor) => viewport.zoom_by(factor),
            Command::Pan(fraction) => viewport.pan_by(fraction),
            Command::Pick(ix) => {
                let view = search.view().await;
                match view.suggestions.get(ix) {
                    Some(suggestion) => {
                        search.on_suggestion_selected(suggestion).await
                    }
                    None => eprintln!("no suggestion {ix}"),
                }
            }
            Command::Edit(text) => search.on_user_edit(text).await,
            Command::Submit(text) => {
                search.on_user_edit(text).await;
                report(search.on_user_submit().await);
            }
        }

        search.drain_viewport_events(&events).await;
        print_view(&search, &viewport).await;
    }

    Ok(())
}

fn report(outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Applied(target) => log::debug!("applied {target:?}"),
        SubmitOutcome::ParseFailed => eprintln!("could not parse position"),
        SubmitOutcome::Superseded => (),
        SubmitOutcome::NoAssembly => eprintln!("no assembly selected"),
    }
}

fn print_usage() {
    let name = std::env::args().next().unwrap_or_else(|| "genopos".into());
    println!("Usage: {name} [--server URL]... [--assembly ID] [--2d]");
    println!("    [--margin F] [--coupling shared|independent]");
    println!("    [--range TEXT] [--width PX] [--timeout MS]");
    println!();
    println!("Each line read from stdin is submitted as a position or gene.");
    println!("Commands: :assemblies  :assembly ID  :zoom F  :pan F");
    println!("          :edit TEXT  :pick N  :quit");
}

pub fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print_usage();
        std::process::exit(0);
    }

    let config = match Config::from_args(pargs) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("genopos-tokio")
        .enable_all()
        .build()?;

    if let Err(e) = runtime.block_on(run(config)) {
        log::error!("{e:?}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse(":q").unwrap(), Command::Quit);
        assert_eq!(
            Command::parse(":assembly hg38").unwrap(),
            Command::Assembly("hg38")
        );
        assert_eq!(Command::parse(":zoom 2.5").unwrap(), Command::Zoom(2.5));
        assert_eq!(Command::parse(":pick 1").unwrap(), Command::Pick(1));
        assert_eq!(
            Command::parse("  BRCA2-TP53 ").unwrap(),
            Command::Submit("BRCA2-TP53")
        );
        assert!(Command::parse(":assembly").is_err());
        assert!(Command::parse(":zoom x").is_err());
    }
}
