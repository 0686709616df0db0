use clap::{Parser, Subcommand};
use medirx_core::config::non_empty_env_value;
use medirx_core::diagnosis::{DiagnosisAssistant, GeminiClient};
use medirx_core::images::{optimized_url, thumbnail_url};
use medirx_core::markdown::{Block, Container, FormattedTreatment, Span};
use medirx_core::Sex;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "medirx")]
#[command(about = "MediRx clinical record system CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview how a treatment plan will be displayed
    Format {
        /// File containing the treatment text
        file: PathBuf,
        /// Print the formatted blocks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build a delivery URL for a hosted image
    ImageUrl {
        /// Public id returned by the image host
        public_id: String,
        /// Maximum width in pixels
        #[arg(long, conflicts_with = "thumbnail")]
        max_width: Option<u32>,
        /// Square face-cropped thumbnail
        #[arg(long)]
        thumbnail: bool,
        /// Image host account
        #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
        cloud_name: String,
    },
    /// Generate a suggested diagnosis and treatment plan
    Generate {
        /// Reported symptoms
        #[arg(long)]
        symptoms: String,
        /// Doctor's initial assessment
        #[arg(long)]
        note: String,
        #[arg(long)]
        age: u32,
        /// Male, Female or Other
        #[arg(long)]
        sex: Sex,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Format { file, json }) => {
            let text = std::fs::read_to_string(&file)?;
            let formatted = FormattedTreatment::from_text(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&formatted)?);
            } else {
                print!("{}", render(&formatted));
            }
        }
        Some(Commands::ImageUrl {
            public_id,
            max_width,
            thumbnail,
            cloud_name,
        }) => {
            let url = if thumbnail {
                thumbnail_url(&cloud_name, &public_id)
            } else {
                optimized_url(&cloud_name, &public_id, max_width)
            };
            println!("{url}");
        }
        Some(Commands::Generate {
            symptoms,
            note,
            age,
            sex,
        }) => {
            let Some(api_key) = non_empty_env_value(std::env::var("GEMINI_API_KEY").ok()) else {
                eprintln!("GEMINI_API_KEY must be set");
                std::process::exit(2);
            };
            let model = non_empty_env_value(std::env::var("GEMINI_MODEL").ok());
            let assistant = DiagnosisAssistant::new(Arc::new(GeminiClient::new(api_key, model)));

            let assessment = assistant.generate(&symptoms, &note, age, sex).await;
            if assessment.is_fallback() {
                eprintln!("Generation failed; showing the standard fallback.");
            }
            println!("DIAGNOSIS:\n{}\n", assessment.diagnosis);
            println!("TREATMENT:");
            print!("{}", render(&FormattedTreatment::from_text(&assessment.treatment)));
        }
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}

/// Terminal rendering: list items indented, bold runs in upper case.
fn render(formatted: &FormattedTreatment) -> String {
    let indent = match formatted.container {
        Container::List => "  ",
        Container::Plain => "",
    };
    let mut out = String::new();
    for block in &formatted.blocks {
        match block {
            Block::ListItem(spans) => {
                out.push_str(indent);
                out.push_str("• ");
                out.push_str(&render_spans(spans));
            }
            Block::Paragraph(spans) => {
                out.push_str(indent);
                out.push_str(&render_spans(spans));
            }
            Block::LineBreak => {}
        }
        out.push('\n');
    }
    out
}

fn render_spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Plain(text) => text.clone(),
            Span::Bold(text) => text.to_uppercase(),
        })
        .collect()
}
