use std::fmt::Write as _;

use anyhow::Context;
use hostlink_runtime::instance::{compile, fetch_locator, ImportStatus};
use hostlink_runtime::{inspect, ModuleInfo, RuntimeConfig, Session};

pub async fn run(config: RuntimeConfig, module: String) -> anyhow::Result<()> {
    let session = Session::new(config)?;
    let bytes = fetch_locator(&module).await?;
    let compiled =
        compile(session.engine(), &bytes).with_context(|| format!("compiling {module}"))?;
    let info = inspect(&compiled, session.imports());
    print!("{}", render(&info));
    if !info.is_linkable() {
        anyhow::bail!("{module} cannot be instantiated against the import table");
    }
    Ok(())
}

pub fn render(info: &ModuleInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "imports ({}):", info.imports.len());
    for import in &info.imports {
        let status = match import.status {
            ImportStatus::Provided => "ok",
            ImportStatus::SignatureMismatch => "MISMATCH",
            ImportStatus::Missing => "MISSING",
        };
        let _ = writeln!(
            out,
            "  {:<8} {}::{} {}",
            status, import.module, import.name, import.signature
        );
    }
    let _ = writeln!(out, "exports ({}):", info.exports.len());
    for export in &info.exports {
        let _ = writeln!(out, "  {export}");
    }
    for missing in &info.missing_exports {
        let _ = writeln!(out, "  MISSING  {missing}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_flags_problems() {
        let session = Session::new(RuntimeConfig::default()).unwrap();
        let module = compile(
            session.engine(),
            br#"(module
                 (import "hostlink" "global_this" (func (result i32)))
                 (import "hostlink" "gl_clear" (func (param i32)))
                 (import "snippets" "now" (func (result f64)))
                 (memory (export "memory") 1)
                 (func (export "hl_start")))"#,
        )
        .unwrap();
        let info = inspect(&module, session.imports());
        let text = render(&info);

        assert!(text.contains("ok       hostlink::global_this () -> i32"));
        assert!(text.contains("MISMATCH hostlink::gl_clear (i32)"));
        assert!(text.contains("MISSING  snippets::now () -> f64"));
        assert!(text.contains("MISSING  hl_alloc"));
        assert!(!info.is_linkable());
    }

    #[tokio::test]
    async fn test_inspect_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.wat");
        std::fs::write(&path, "(module)").unwrap();
        let err = run(RuntimeConfig::default(), path.display().to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot be instantiated"));
    }
}
