mod commands;
mod utils;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fleetstack_config::UserConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "宣言したリソースグラフを、環境ごとに組み立てる。", long_about = None)]
struct Cli {
    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// 環境名の指定（位置引数、-e/--env、STACK_ENV）
#[derive(Args, Debug, Clone, Default)]
struct EnvArgs {
    /// 環境名 (dev, stg, prd)
    environment: Option<String>,
    /// 環境名 (-e/--env フラグ、STACK_ENV 環境変数)
    #[arg(short = 'e', long = "env", env = "STACK_ENV", hide = true)]
    env_flag: Option<String>,
}

impl EnvArgs {
    fn into_name(self) -> Option<String> {
        self.environment.or(self.env_flag)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 環境を起動（build → cloud → cluster）
    Up {
        #[command(flatten)]
        env: EnvArgs,
        /// 宣言順に反する参照をエラーにする
        #[arg(long)]
        strict: bool,
        /// シークレットファイルが読めるか確認する
        #[arg(long)]
        check_secrets: bool,
    },
    /// 環境を削除（cluster → cloud、逆順）
    Down {
        #[command(flatten)]
        env: EnvArgs,
    },
    /// 環境のリソース一覧を表示
    Ls {
        #[command(flatten)]
        env: EnvArgs,
    },
    /// 適用計画を表示
    Plan {
        #[command(flatten)]
        env: EnvArgs,
        /// JSONで出力
        #[arg(long)]
        json: bool,
        /// 宣言順に反する参照をエラーにする
        #[arg(long)]
        strict: bool,
    },
    /// 宣言を検証（環境未指定なら全環境）
    Validate {
        #[command(flatten)]
        env: EnvArgs,
    },
    /// バージョン情報を表示
    Version,
}

/// コマンド共通のコンテキスト
pub struct Context {
    pub project_root: PathBuf,
    pub user_config: UserConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 標準出力はコマンドの結果に使うので、ログはstderrへ
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Versionコマンドは宣言ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("fleetstack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let project_root = match fleetstack_core::find_project_root() {
        Ok(root) => root,
        Err(fleetstack_core::StackError::ProjectRootNotFound(dir)) => {
            eprintln!();
            eprintln!("{}", "✗ プロジェクトルートが見つかりません".red().bold());
            eprintln!("  検索開始: {}", dir.display());
            eprintln!();
            eprintln!("stack.kdl が存在するディレクトリで実行してください");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    let user_config = UserConfig::load()?;
    let ctx = Context {
        project_root,
        user_config,
    };

    // コマンドディスパッチ
    match cli.command {
        Commands::Up {
            env,
            strict,
            check_secrets,
        } => {
            commands::up::handle(&ctx, env.into_name(), strict, check_secrets).await?;
        }
        Commands::Down { env } => {
            commands::down::handle(&ctx, env.into_name()).await?;
        }
        Commands::Ls { env } => {
            commands::ls::handle(&ctx, env.into_name())?;
        }
        Commands::Plan { env, json, strict } => {
            commands::plan::handle(&ctx, env.into_name(), json, strict)?;
        }
        Commands::Validate { env } => {
            commands::validate::handle(&ctx, env.into_name())?;
        }
        Commands::Version => {
            unreachable!("Version is handled before workspace loading");
        }
    }

    Ok(())
}
