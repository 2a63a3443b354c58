// fmt.rs — `cpctl fmt`: re-serialize a document in canonical order.
//
// Output goes to `--output` when given, otherwise stdout. Indentation and the
// XML declaration come from the [output] table of the config.

use std::path::Path;

use anyhow::Context;

use crate::config::ToolConfig;

pub fn execute(file: &Path, output: Option<&Path>, config: &ToolConfig) -> anyhow::Result<()> {
    let text = render(file, config)?;
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(from = %file.display(), to = %path.display(), "formatted document");
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn render(file: &Path, config: &ToolConfig) -> anyhow::Result<String> {
    let ruleset = super::read_ruleset(file)?;
    let text = ruleset
        .to_xml_with(&config.output)
        .with_context(|| format!("cannot serialize {}", file.display()))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_policy::SerializeOptions;

    const MESSY: &str = r#"<ruleset xmlns="urn:ietf:params:xml:ns:common-policy">
      <rule id="r1">
        <conditions>
          <sphere value="work"/>
          <identity><one id="sip:a@example.com"/></identity>
        </conditions>
      </rule>
    </ruleset>"#;

    #[test]
    fn reorders_and_honors_output_options() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        std::fs::write(&input, MESSY).unwrap();

        let config = ToolConfig {
            output: SerializeOptions {
                indent: 0,
                declaration: false,
            },
            ..Default::default()
        };
        let text = render(&input, &config).unwrap();
        assert!(!text.starts_with("<?xml"));
        assert!(!text.contains('\n'));
        assert!(text.find("<cp:identity>").unwrap() < text.find("<cp:sphere").unwrap());
    }

    #[test]
    fn writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        let output = dir.path().join("out.xml");
        std::fs::write(&input, MESSY).unwrap();

        execute(&input, Some(&output), &ToolConfig::default()).unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert_eq!(
            cp_policy::RuleSet::from_xml(&written).unwrap(),
            cp_policy::RuleSet::from_xml(MESSY).unwrap()
        );
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = render(&dir.path().join("nope.xml"), &ToolConfig::default()).unwrap_err();
        assert!(err.to_string().contains("failed to read"), "{}", err);
    }
}
