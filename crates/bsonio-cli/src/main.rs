use anyhow::Context;
use bsonio::JsonOutputMode;
use bsonio_cli::{convert, init_logging, Config, Format};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bsonio-cli")]
#[command(author = "ITSTUDIO")]
#[command(version)]
#[command(about = "Convert between BSON and extended JSON")]
struct Args {
    /// 输入文件,`-` 表示标准输入
    input: PathBuf,

    /// 输入格式,缺省时按扩展名推断
    #[arg(long)]
    from: Option<Format>,

    /// 输出格式,缺省为输入格式的另一种
    #[arg(long)]
    to: Option<Format>,

    /// JSON 输出方言: strict, shell, tengen
    #[arg(short, long)]
    mode: Option<JsonOutputMode>,

    /// 缩进 JSON 输出
    #[arg(short, long)]
    indent: bool,

    /// 分块缓冲区的块大小
    #[arg(long)]
    chunk_size: Option<usize>,

    /// TOML 配置文件
    #[arg(short, long, env = "BSONIO_CONFIG")]
    config: Option<PathBuf>,

    /// 输出文件,缺省写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(mode) = args.mode {
        config.codec.json_writer.output_mode = mode;
    }
    if args.indent {
        config.codec.json_writer.indent = true;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.set_chunk_size(chunk_size);
    }
    config.codec.validate()?;
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    init_logging(&config.log_level);

    let stdin = args.input.as_os_str() == "-";
    let from = match args.from {
        Some(format) => format,
        None => Format::from_extension(&args.input).with_context(|| {
            format!(
                "Cannot infer the input format of {}, pass --from",
                args.input.display()
            )
        })?,
    };
    let to = args.to.unwrap_or_else(|| from.opposite());

    let mut input: Box<dyn Read> = if stdin {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };
    let output = convert(&mut input, from, to, &config.codec)?;

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(&output)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            if to == Format::Json {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
        }
    }

    info!(
        input = %args.input.display(),
        ?from,
        ?to,
        bytes = output.len(),
        "conversion finished"
    );
    Ok(())
}
