//! Procedure code and description extraction.

use crate::models::{normalize_description, CODE_PATTERN};

use super::patterns::{CODE_ANYWHERE, PROCEDURE_HEADER};
use super::CategoryExtraction;

/// Code and description of one procedure block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub code: String,
    pub description: String,
}

/// Extract the procedure identity from a block of text.
///
/// The header form (`code Procedimento: description`) scores 95. A
/// bare code anywhere scores 70, taking the following line as the
/// description when present. No code at all scores 0.
pub fn extract(block: &str) -> CategoryExtraction<Option<Identification>> {
    if let Some(caps) = PROCEDURE_HEADER.captures(block) {
        let code = caps[1].trim().to_string();
        if CODE_PATTERN.is_match(&code) {
            return CategoryExtraction::new(
                Some(Identification {
                    code,
                    description: normalize_description(&caps[2]),
                }),
                95.0,
            );
        }
    }

    if let Some(caps) = CODE_ANYWHERE.captures(block) {
        let code = caps[1].to_string();
        let description = block
            .lines()
            .skip_while(|line| !line.contains(&code))
            .nth(1)
            .map(normalize_description)
            .unwrap_or_default();

        return CategoryExtraction::new(Some(Identification { code, description }), 70.0);
    }

    CategoryExtraction::new(None, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_form_scores_high() {
        let block = "03.01.01.004-8  Procedimento: Consulta de profissionais de nível superior\nComplexidade: Atenção Básica";
        let result = extract(block);
        assert_eq!(result.confidence, 95.0);
        let id = result.value.unwrap();
        assert_eq!(id.code, "03.01.01.004-8");
        assert_eq!(id.description, "CONSULTA DE PROFISSIONAIS DE NÍVEL SUPERIOR");
    }

    #[test]
    fn test_bare_code_fallback() {
        let block = "cabeçalho\n04.08.05.012-7\nARTRODESE DE COLUNA\noutros campos";
        let result = extract(block);
        assert_eq!(result.confidence, 70.0);
        let id = result.value.unwrap();
        assert_eq!(id.code, "04.08.05.012-7");
        assert_eq!(id.description, "ARTRODESE DE COLUNA");
    }

    #[test]
    fn test_bare_code_without_following_line() {
        let result = extract("04.08.05.012-7");
        assert_eq!(result.confidence, 70.0);
        assert_eq!(result.value.unwrap().description, "");
    }

    #[test]
    fn test_no_code_scores_zero() {
        let result = extract("página de índice sem procedimentos");
        assert_eq!(result.confidence, 0.0);
        assert!(result.value.is_none());
    }
}
