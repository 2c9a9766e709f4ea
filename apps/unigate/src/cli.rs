use clap::Parser;

#[derive(Parser)]
#[command(name = "unigate")]
pub(crate) struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub(crate) host: String,
    #[arg(long, default_value_t = 3000)]
    pub(crate) port: u16,
    #[arg(long, default_value = "")]
    pub(crate) data_dir: String,
}
