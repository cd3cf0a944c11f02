//! Extraction prompt for the LLM fallback.

/// Build the schema-constrained extraction prompt for one page.
pub fn build_extraction_prompt(
    page_text: &str,
    page_number: u32,
    total_pages: Option<usize>,
) -> String {
    let page_context = match total_pages {
        Some(total) => format!("{} de {}", page_number, total),
        None => page_number.to_string(),
    };

    format!(
        r#"# ESPECIALISTA EM EXTRAÇÃO SIGTAP-DATASUS

Você é um especialista em processar dados da tabela SIGTAP (Sistema de Gerenciamento da Tabela de Procedimentos) do DATASUS.

## CONTEXTO
- Página: {page_context}
- Documento: tabela oficial SIGTAP do Ministério da Saúde
- Formato esperado: procedimentos estruturados com códigos, descrições e valores

## INSTRUÇÕES CRÍTICAS
1. **EXTRAIA APENAS** procedimentos com códigos no formato: XX.XX.XX.XXX-X
2. **IDENTIFIQUE** o padrão: "CÓDIGO Procedimento: DESCRIÇÃO"
3. **CAPTURE** todos os campos disponíveis para cada procedimento
4. **NORMALIZE** valores monetários para formato numérico (ex: "R$ 45,67" -> 45.67)
5. **PADRONIZE** complexidade para: "ATENÇÃO BÁSICA", "BAIXA COMPLEXIDADE", "MÉDIA COMPLEXIDADE", "ALTA COMPLEXIDADE"

## CAMPOS OBRIGATÓRIOS
- code: código do procedimento (XX.XX.XX.XXX-X)
- description: descrição completa do procedimento
- complexity: nível de complexidade padronizado

## CAMPOS OPCIONAIS (extrair se disponível)
- modality: modalidade (ex: "01 - Ambulatorial")
- registrationInstrument: instrumento de registro
- financing: tipo de financiamento
- valueAmb, valueAmbTotal, valueHosp, valueProf, valueHospTotal: valores financeiros
- maxQuantity, averageStay, points: limites operacionais
- cbo, cid, habilitation: classificações médicas

## FORMATO DE SAÍDA
Retorne APENAS um JSON válido sem texto adicional:

```json
{{
  "success": true,
  "procedures": [
    {{
      "code": "01.01.01.001-2",
      "description": "CONSULTA MÉDICA EM ATENÇÃO BÁSICA",
      "complexity": "ATENÇÃO BÁSICA",
      "modality": "01 - Ambulatorial",
      "financing": "01 - Atenção Básica (PAB)",
      "valueAmb": 15.00,
      "valueAmbTotal": 15.00,
      "valueHosp": 0.00,
      "valueProf": 0.00,
      "valueHospTotal": 0.00
    }}
  ],
  "confidence": 95,
  "notes": ["observações sobre a extração, se houver"]
}}
```

## TEXTO DA PÁGINA:
{page_text}

---
IMPORTANTE: Retorne apenas o JSON válido. Não adicione explicações ou texto extra."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_page_text_and_context() {
        let prompt = build_extraction_prompt("03.01.01.004-8 Procedimento: CONSULTA", 7, Some(120));
        assert!(prompt.contains("Página: 7 de 120"));
        assert!(prompt.contains("03.01.01.004-8 Procedimento: CONSULTA"));
        assert!(prompt.contains("XX.XX.XX.XXX-X"));
    }

    #[test]
    fn test_prompt_without_total_pages() {
        let prompt = build_extraction_prompt("texto", 3, None);
        assert!(prompt.contains("Página: 3\n"));
    }
}
