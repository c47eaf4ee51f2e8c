use regex::Regex;

use crate::error::AccountError;

/// Format checks for identity fields. Patterns are compiled once per state.
pub struct AccountValidator {
    email: Regex,
    cpf: Regex,
    crm: Regex,
}

impl AccountValidator {
    pub fn new() -> Result<Self, AccountError> {
        Ok(Self {
            email: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")?,
            cpf: Regex::new(r"^\d{3}\.?\d{3}\.?\d{3}-?\d{2}$")?,
            crm: Regex::new(r"^[0-9]{4,10}(-?[A-Za-z]{2})?$")?,
        })
    }

    /// Lower-cased, trimmed email.
    pub fn normalize_email(&self, email: &str) -> Result<String, AccountError> {
        let email = email.trim().to_lowercase();
        if email.len() > 254 || !self.email.is_match(&email) {
            return Err(AccountError::Validation(format!("Invalid email address: {}", email)));
        }
        Ok(email)
    }

    /// Accepts `12345678909` or `123.456.789-09` and returns the 11 digits.
    pub fn normalize_cpf(&self, cpf: &str) -> Result<String, AccountError> {
        let cpf = cpf.trim();
        if !self.cpf.is_match(cpf) {
            return Err(AccountError::Validation("CPF must contain exactly 11 digits".to_string()));
        }
        Ok(cpf.chars().filter(char::is_ascii_digit).collect())
    }

    pub fn normalize_crm(&self, crm: &str) -> Result<String, AccountError> {
        let crm = crm.trim().to_uppercase();
        if !self.crm.is_match(&crm) {
            return Err(AccountError::Validation(format!("Invalid CRM: {}", crm)));
        }
        Ok(crm)
    }
}
