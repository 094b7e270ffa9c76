use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upcycle-ai")]
#[command(about = "廃材の写真からアップサイクル企画を提案するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真を解析して企画案を出す
    Analyze {
        /// 画像ファイルまたはフォルダ（複数可）
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// 1件目の画像を自動生成しない
        #[arg(long)]
        no_image: bool,

        /// 結果を表示するだけで対話メニューを出さない
        #[arg(long)]
        no_interactive: bool,
    },

    /// 保存済み企画の一覧
    List,

    /// 保存済み企画の詳細
    Show {
        /// 企画ID（前方一致可）
        id: String,
    },

    /// 保存済み企画を削除
    Delete {
        /// 企画ID（前方一致可）
        id: String,

        /// 確認せずに削除
        #[arg(short, long)]
        yes: bool,
    },

    /// 保存済み企画の画像を（再）生成
    Image {
        /// 企画ID（前方一致可）
        id: String,

        /// 生成した画像をファイルに書き出す
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 保存済み企画にジャーナルを追記
    Journal {
        /// 企画ID（前方一致可）
        id: String,

        /// メモ
        #[arg(short, long)]
        note: Option<String>,

        /// 写真ファイル
        #[arg(short, long)]
        photo: Option<PathBuf>,
    },

    /// AIに相談（ID指定でその企画について）
    Chat {
        /// 企画ID（前方一致可）
        id: Option<String>,
    },

    /// 👎した企画の一覧
    Disliked {
        /// 👎一覧を空にする
        #[arg(long)]
        clear: bool,
    },

    /// 設定
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 保存したAPIキーを削除
        #[arg(long)]
        clear_api_key: bool,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
