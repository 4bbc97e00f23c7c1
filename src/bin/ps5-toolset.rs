use anyhow::Context;
use log::LevelFilter;
use ps5_toolset::exploits::{Exploit, RunOptions};
use ps5_toolset::{logger, Paths};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "ps5-toolset",
    about = "Deploy payloads to a PS5 on the local network"
)]
struct Opt {
    /// Exploit to use, or `list` to list, or `info <name>` for details
    #[structopt(long)]
    exploit: Vec<String>,

    /// Force re-prompt for the device address
    #[structopt(long)]
    config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logger::init(LevelFilter::Info).context("initialize logger")?;

    match dotenv::dotenv() {
        Ok(path) => log::info!("loaded .env from {}", path.display()),
        Err(err) => log::debug!("couldn't load .env file: {err:?}"),
    };

    let opt = Opt::from_args();
    let paths = Paths::from_env()?;

    if opt.exploit.is_empty() {
        Opt::clap().print_help().context("print help")?;
        println!();
        std::process::exit(1);
    }

    match opt.exploit[0].to_lowercase().as_str() {
        "list" => list_exploits(&paths).await,
        "info" => {
            let Some(name) = opt.exploit.get(1) else {
                log::error!("please specify an exploit name");
                log::error!("available exploits: {}", Exploit::available());
                std::process::exit(1);
            };
            show_info(&paths, name).await
        }
        name => {
            let Some(exploit) = Exploit::find(name) else {
                log::error!("unknown exploit `{}`", opt.exploit[0]);
                log::error!("available exploits: {}", Exploit::available());
                std::process::exit(1);
            };
            exploit
                .run(&RunOptions {
                    paths,
                    config_override: opt.config,
                })
                .await
        }
    }
}

async fn list_exploits(paths: &Paths) -> anyhow::Result<()> {
    println!("\nAvailable Exploits:");
    println!("{:<20} {:<20} {}", "Name", "Author", "About");
    println!("{}", "-".repeat(70));
    for exploit in Exploit::ALL {
        let info = exploit.info(paths).await;
        println!(
            "{:<20} {:<20} {}",
            exploit.name(),
            truncate(&info.author, 18),
            truncate(&info.about, 25),
        );
    }
    println!();
    Ok(())
}

async fn show_info(paths: &Paths, name: &str) -> anyhow::Result<()> {
    let Some(exploit) = Exploit::find(name) else {
        log::error!("unknown exploit `{name}`");
        log::error!("available exploits: {}", Exploit::available());
        std::process::exit(1);
    };

    let info = exploit.info(paths).await;
    println!("\n=== {} ===", exploit.name());
    println!("About:    {}", info.about);
    println!("Author:   {}", info.author);
    println!("License:  {}", info.license);
    println!();
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut = text.chars().take(max.saturating_sub(3)).collect::<String>();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
